//! Parsers for the portal's rendered text: hourly usage labels and day
//! headings. Pure functions, no browser involvement.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::ScraperError;

fn usage_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Usage on (\d+) (am|pm) was (\d+) Litres$").expect("valid usage label regex")
    })
}

fn day_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z]+)\s+(\d{1,2})\s+([A-Za-z]+)\s*$")
            .expect("valid day heading regex")
    })
}

/// Parse a chart bar label like "Usage on 3 pm was 120 Litres" into a
/// 24h hour key and a litre count.
///
/// Returns `None` on any mismatch. Empty and placeholder labels are routine,
/// so this is not an error path.
pub fn parse_usage_label(label: &str) -> Option<(String, u32)> {
    let caps = usage_label_re().captures(label)?;

    let hour: u32 = caps[1].parse().ok()?;
    let value: u32 = caps[3].parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }

    // 12 am is midnight, 12 pm stays noon.
    let hour = match (&caps[2], hour) {
        ("am", 12) => 0,
        ("am", h) => h,
        ("pm", 12) => 12,
        (_, h) => h + 12,
    };

    Some((format!("{:02}:00", hour), value))
}

/// Parse a portal day heading like "Monday 3 March" into a date.
///
/// The portal omits the year, so it is inferred from `today`. Headings only
/// ever cover recent history, so an inferred date in the future belongs to
/// the previous year; this also covers December headings seen in January.
pub fn parse_day_heading(heading: &str, today: NaiveDate) -> Result<NaiveDate, ScraperError> {
    let caps = day_heading_re()
        .captures(heading)
        .ok_or_else(|| ScraperError::Parse(format!("unrecognized day heading: {:?}", heading)))?;

    let day = &caps[2];
    let month = &caps[3];

    // The weekday token is dropped: the portal renders it but the inferred
    // year makes strict weekday validation meaningless.
    let with_year = |year: i32| {
        NaiveDate::parse_from_str(&format!("{} {} {}", day, month, year), "%d %B %Y")
            .map_err(|e| ScraperError::Parse(format!("day heading {:?}: {}", heading, e)))
    };

    let date = with_year(today.year())?;
    if date > today {
        return with_year(today.year() - 1);
    }
    Ok(date)
}
