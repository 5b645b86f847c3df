//! Merges one scrape attempt's usage map into the cumulative statistics
//! series, continuing from the last persisted point.

use chrono::NaiveTime;
use tracing::debug;

use crate::error::ScraperError;
use crate::types::{CumulativePoint, LastKnownState, UsageMap};

/// Turn hourly usage into append candidates for the statistics sink.
///
/// Whole days already covered by `last_known` are skipped; a day is covered
/// once the last persisted point reaches or passes its midnight. Hours within
/// a partially recorded day are deliberately not backfilled. The running sum
/// continues from `last_known.sum`, or starts at zero on a cold start.
pub fn reconcile(
    usage: &UsageMap,
    last_known: Option<&LastKnownState>,
) -> Result<Vec<CumulativePoint>, ScraperError> {
    let mut sum = last_known.map_or(0.0, |l| l.sum);
    let mut points = Vec::new();

    for (day, hours) in usage {
        if let Some(last) = last_known {
            let day_start = day.and_time(NaiveTime::MIN).and_utc();
            if day_start < last.end {
                debug!("skipping already recorded day {}", day);
                continue;
            }
        }

        for (hour, &litres) in hours {
            let time = NaiveTime::parse_from_str(hour, "%H:%M")
                .map_err(|e| ScraperError::Parse(format!("hour key {:?}: {}", hour, e)))?;
            sum += f64::from(litres);
            points.push(CumulativePoint {
                start: day.and_time(time).and_utc(),
                state: f64::from(litres),
                sum,
            });
        }
    }

    Ok(points)
}
