//! Core data types shared across the scrape and reconcile stages.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Hourly litres for one day, keyed by "HH:00". Sparse hours are normal.
pub type DayUsage = BTreeMap<String, u32>;

/// One scrape attempt's complete result: day -> hourly usage.
///
/// Owned by a single attempt and discarded after reconciliation; the BTreeMap
/// keeps days and hours in ascending order for the reconciler.
pub type UsageMap = BTreeMap<NaiveDate, DayUsage>;

/// One hourly statistics point in the cumulative series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativePoint {
    /// UTC instant at the top of the hour.
    pub start: DateTime<Utc>,
    /// Instantaneous usage for this hour, in litres.
    pub state: f64,
    /// Running total up to and including this hour. Non-decreasing.
    pub sum: f64,
}

/// The most recent previously persisted point, as reported by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastKnownState {
    pub end: DateTime<Utc>,
    pub sum: f64,
}

/// Metadata handed to the statistics sink alongside new points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticMetadata {
    pub statistic_id: String,
    pub name: String,
    pub unit_of_measurement: String,
}

impl StatisticMetadata {
    pub fn water_consumption() -> Self {
        Self {
            statistic_id: "st_water:consumption".to_string(),
            name: "ST Water Consumption".to_string(),
            unit_of_measurement: "L".to_string(),
        }
    }
}
