//! End-to-end scrape loop: drive a portal session through every available
//! day, with bounded retries and a guaranteed session close per attempt.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::parse;
use crate::session::{PortalDriver, SessionDriver};
use crate::types::UsageMap;

pub const MAX_RETRIES: u32 = 3;

/// Backoff between attempts, or `None` once retries are exhausted.
///
/// Pure so the retry policy can be reasoned about apart from the session
/// lifecycle.
pub fn retry_delay(failed_attempts: u32) -> Option<Duration> {
    if failed_attempts >= MAX_RETRIES {
        None
    } else {
        Some(Duration::from_secs(5 * u64::from(failed_attempts)))
    }
}

/// Scrape every available day of hourly usage from the portal.
///
/// Makes up to [`MAX_RETRIES`] full attempts; each attempt gets a fresh
/// session which is closed on every exit path, and is bounded by the
/// configured attempt timeout.
pub async fn fetch_usage(config: &ScraperConfig) -> Result<UsageMap, ScraperError> {
    let today = Utc::now().date_naive();
    let make_driver = || PortalDriver::new(config.clone());
    fetch_usage_with(make_driver, today, config.attempt_timeout).await
}

/// Retry loop over an arbitrary driver factory. Split out from
/// [`fetch_usage`] so tests can substitute a scripted driver.
pub async fn fetch_usage_with<D, F>(
    mut make_driver: F,
    today: NaiveDate,
    attempt_timeout: Duration,
) -> Result<UsageMap, ScraperError>
where
    D: SessionDriver,
    F: FnMut() -> D,
{
    let mut failed_attempts = 0;
    loop {
        let attempt = failed_attempts + 1;
        info!("scrape attempt {}/{}", attempt, MAX_RETRIES);

        let mut driver = make_driver();
        let outcome = tokio::time::timeout(attempt_timeout, run_attempt(&mut driver, today)).await;

        // Close the session before looking at the outcome; this runs on
        // success, error and attempt timeout alike.
        if let Err(e) = driver.close().await {
            warn!("error closing session after attempt {}: {}", attempt, e);
        }

        let error = match outcome {
            Ok(Ok(usage)) if !usage.is_empty() => {
                info!("scrape succeeded with {} days of data", usage.len());
                return Ok(usage);
            }
            Ok(Ok(_)) => ScraperError::NoData("portal returned no usage days".into()),
            Ok(Err(e)) => e,
            Err(_) => ScraperError::Timeout(format!(
                "attempt exceeded its {}s budget",
                attempt_timeout.as_secs()
            )),
        };

        failed_attempts += 1;
        warn!("attempt {} failed: {}", attempt, error);

        match retry_delay(failed_attempts) {
            Some(delay) => {
                debug!("retrying in {:?}", delay);
                sleep(delay).await;
            }
            None => {
                return Err(ScraperError::Scrape(format!(
                    "{} attempts failed, last error: {}",
                    failed_attempts, error
                )));
            }
        }
    }
}

/// One full pass: login, open the day view, then page backwards reading each
/// day until the portal has no more history.
async fn run_attempt<D: SessionDriver>(
    driver: &mut D,
    today: NaiveDate,
) -> Result<UsageMap, ScraperError> {
    driver.login().await?;
    driver.open_daily_view().await?;

    let mut usage = UsageMap::new();
    loop {
        let (heading, labels) = driver.read_day().await?;
        // An unreadable heading poisons the whole day, so it aborts the
        // attempt; unreadable bar labels are just empty buckets.
        let day = parse::parse_day_heading(&heading, today)?;

        let hours = usage.entry(day).or_default();
        for label in &labels {
            match parse::parse_usage_label(label) {
                Some((hour, litres)) => {
                    hours.insert(hour, litres);
                }
                None => debug!("skipping unrecognized usage label {:?}", label),
            }
        }
        debug!("day {}: {} hourly samples", day, hours.len());

        if !driver.advance_to_previous_day().await? {
            break;
        }
    }

    Ok(usage)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    /// Driver scripted to fail a number of logins, then serve a fixed run
    /// of days. Counts closes so the cleanup guarantee can be asserted.
    struct ScriptedDriver {
        fail_logins_remaining: Arc<AtomicU32>,
        days: Vec<(String, Vec<String>)>,
        cursor: usize,
        closes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SessionDriver for ScriptedDriver {
        async fn login(&mut self) -> Result<(), ScraperError> {
            if self
                .fail_logins_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ScraperError::Navigation("widget missing".into()));
            }
            Ok(())
        }

        async fn open_daily_view(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn read_day(&mut self) -> Result<(String, Vec<String>), ScraperError> {
            let (heading, labels) = &self.days[self.cursor];
            Ok((heading.clone(), labels.clone()))
        }

        async fn advance_to_previous_day(&mut self) -> Result<bool, ScraperError> {
            if self.cursor + 1 < self.days.len() {
                self.cursor += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn close(&mut self) -> Result<(), ScraperError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_days() -> Vec<(String, Vec<String>)> {
        vec![
            (
                "Sunday 3 March".to_string(),
                vec![
                    "Usage on 12 am was 5 Litres".to_string(),
                    "Usage on 3 pm was 120 Litres".to_string(),
                ],
            ),
            (
                "Saturday 2 March".to_string(),
                vec!["Usage on 12 pm was 40 Litres".to_string()],
            ),
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_succeeds_first_try() {
        let closes = Arc::new(AtomicU32::new(0));
        let usage = fetch_usage_with(
            || ScriptedDriver {
                fail_logins_remaining: Arc::new(AtomicU32::new(0)),
                days: sample_days(),
                cursor: 0,
                closes: Arc::clone(&closes),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap();

        assert_eq!(usage.len(), 2);
        let day = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        assert_eq!(usage[&day]["00:00"], 5);
        assert_eq!(usage[&day]["15:00"], 120);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds_closing_every_session() {
        let failures = Arc::new(AtomicU32::new(2));
        let closes = Arc::new(AtomicU32::new(0));

        let usage = fetch_usage_with(
            || ScriptedDriver {
                fail_logins_remaining: Arc::clone(&failures),
                days: sample_days(),
                cursor: 0,
                closes: Arc::clone(&closes),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap();

        assert_eq!(usage.len(), 2);
        // One close per attempt, failed attempts included.
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_scrape_error() {
        let failures = Arc::new(AtomicU32::new(u32::MAX));
        let closes = Arc::new(AtomicU32::new(0));

        let err = fetch_usage_with(
            || ScriptedDriver {
                fail_logins_remaining: Arc::clone(&failures),
                days: sample_days(),
                cursor: 0,
                closes: Arc::clone(&closes),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScraperError::Scrape(_)));
        assert_eq!(closes.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test(start_paused = true)]
    async fn test_day_without_labels_is_still_a_day() {
        // Sparse hours are legitimate; a label-less day must not fail the
        // scrape.
        let usage = fetch_usage_with(
            || ScriptedDriver {
                fail_logins_remaining: Arc::new(AtomicU32::new(0)),
                days: vec![("Sunday 3 March".to_string(), vec![])],
                cursor: 0,
                closes: Arc::new(AtomicU32::new(0)),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        assert!(usage[&day].is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_yields_one_daykey_per_day() {
        let days: Vec<(String, Vec<String>)> = (1..=5)
            .map(|d| (format!("Friday {} March", d), vec![]))
            .collect();

        let usage = fetch_usage_with(
            || ScriptedDriver {
                fail_logins_remaining: Arc::new(AtomicU32::new(0)),
                days: days.clone(),
                cursor: 0,
                closes: Arc::new(AtomicU32::new(0)),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap();

        assert_eq!(usage.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_heading_aborts_and_retries() {
        let closes = Arc::new(AtomicU32::new(0));
        let err = fetch_usage_with(
            || ScriptedDriver {
                fail_logins_remaining: Arc::new(AtomicU32::new(0)),
                days: vec![("not a date".to_string(), vec![])],
                cursor: 0,
                closes: Arc::clone(&closes),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScraperError::Scrape(_)));
        assert_eq!(closes.load(Ordering::SeqCst), MAX_RETRIES);
    }

    /// Driver whose login never resolves, for exercising the attempt budget.
    struct StalledDriver {
        closes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SessionDriver for StalledDriver {
        async fn login(&mut self) -> Result<(), ScraperError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn open_daily_view(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn read_day(&mut self) -> Result<(String, Vec<String>), ScraperError> {
            Ok((String::new(), Vec::new()))
        }

        async fn advance_to_previous_day(&mut self) -> Result<bool, ScraperError> {
            Ok(false)
        }

        async fn close(&mut self) -> Result<(), ScraperError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_timeout_counts_as_failed_attempt() {
        let closes = Arc::new(AtomicU32::new(0));

        let err = fetch_usage_with(
            || StalledDriver {
                closes: Arc::clone(&closes),
            },
            today(),
            Duration::from_secs(120),
        )
        .await
        .unwrap_err();

        // Each stalled attempt hits the budget, is closed, and counts
        // against the retry policy like any other failure.
        assert!(matches!(err, ScraperError::Scrape(_)));
        assert!(err.to_string().contains("budget"));
        assert_eq!(closes.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[test]
    fn test_retry_delay_policy() {
        assert_eq!(retry_delay(1), Some(Duration::from_secs(5)));
        assert_eq!(retry_delay(2), Some(Duration::from_secs(10)));
        assert_eq!(retry_delay(3), None);
    }
}
