//! Interface to the external long-term statistics store. The store itself is
//! a host concern; this crate only produces append candidates.

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::types::{CumulativePoint, LastKnownState, StatisticMetadata};

#[async_trait]
pub trait StatisticsSink: Send + Sync {
    /// The most recent persisted point for a series, if any.
    async fn last_point(
        &self,
        statistic_id: &str,
    ) -> Result<Option<LastKnownState>, ScraperError>;

    /// Append new points. Implementations are expected to upsert by
    /// timestamp; callers may resend points around the day boundary.
    async fn append(
        &self,
        metadata: &StatisticMetadata,
        points: &[CumulativePoint],
    ) -> Result<(), ScraperError>;
}
