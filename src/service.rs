use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::provider::{DebugFileProvider, LiveProvider, UsageProvider};
use crate::reconcile::reconcile;
use crate::types::{CumulativePoint, LastKnownState, UsageMap};

/// One fetch-and-reconcile cycle's input.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub username: String,
    pub password: String,
    pub endpoint: Option<String>,
    pub headless: bool,
    /// When set, usage comes from this JSON file instead of a live scrape.
    pub debug_data: Option<PathBuf>,
    /// Last persisted point, as reported by the host's statistics sink.
    pub last_known: Option<LastKnownState>,
}

impl FetchRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            endpoint: None,
            headless: true,
            debug_data: None,
            last_known: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_data = Some(path.into());
        self
    }

    pub fn with_last_known(mut self, last_known: LastKnownState) -> Self {
        self.last_known = Some(last_known);
        self
    }
}

impl From<&FetchRequest> for ScraperConfig {
    fn from(req: &FetchRequest) -> Self {
        let mut config = ScraperConfig::new(&req.username, &req.password)
            .with_headless(req.headless);
        if let Some(endpoint) = &req.endpoint {
            config = config.with_endpoint(endpoint);
        }
        config
    }
}

/// One cycle's output: the raw usage map and the reconciled append
/// candidates for the sink.
#[derive(Debug)]
pub struct FetchResult {
    pub usage: UsageMap,
    pub points: Vec<CumulativePoint>,
}

/// tower::Service front over fetch + reconcile.
#[derive(Debug, Clone, Default)]
pub struct UsageService {
    // Room for rate limiting / caching layers later.
}

impl UsageService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<FetchRequest> for UsageService {
    type Response = FetchResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: FetchRequest) -> Self::Future {
        info!("usage fetch requested for {}", req.username);

        Box::pin(async move {
            let provider: Box<dyn UsageProvider> = match &req.debug_data {
                Some(path) => Box::new(DebugFileProvider::new(path)),
                None => Box::new(LiveProvider::new(ScraperConfig::from(&req))),
            };

            let usage = provider.fetch_usage().await?;
            let points = reconcile(&usage, req.last_known.as_ref())?;

            info!(
                "fetch complete: {} days scraped, {} new points",
                usage.len(),
                points.len()
            );

            Ok(FetchResult { usage, points })
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_fetch_request_builder() {
        let req = FetchRequest::new("user", "pass")
            .with_endpoint("ws://localhost:9222")
            .with_headless(false)
            .with_debug_data("/tmp/usage_data.json");

        assert_eq!(req.username, "user");
        assert_eq!(req.password, "pass");
        assert_eq!(req.endpoint.as_deref(), Some("ws://localhost:9222"));
        assert!(!req.headless);
        assert_eq!(req.debug_data, Some(PathBuf::from("/tmp/usage_data.json")));
    }

    #[test]
    fn test_fetch_request_to_config() {
        let req = FetchRequest::new("user", "pass").with_endpoint("ws://remote:9222");
        let config = ScraperConfig::from(&req);

        assert_eq!(config.username, "user");
        assert_eq!(config.password, "pass");
        assert_eq!(config.endpoint.as_deref(), Some("ws://remote:9222"));
    }

    #[tokio::test]
    async fn test_service_debug_data_path_reconciles() {
        let dir = std::env::temp_dir();
        let path = dir.join("stw_scraper_service_test.json");
        tokio::fs::write(
            &path,
            r#"{"2024-03-03":{"23:00":50},"2024-03-04":{"00:00":10,"01:00":20}}"#,
        )
        .await
        .unwrap();

        let mut service = UsageService::new();
        let req = FetchRequest::new("user", "pass")
            .with_debug_data(&path)
            .with_last_known(LastKnownState {
                end: Utc.with_ymd_and_hms(2024, 3, 3, 23, 0, 0).unwrap(),
                sum: 1000.0,
            });

        let result = service.call(req).await.unwrap();
        assert_eq!(result.usage.len(), 2);
        assert_eq!(result.points.len(), 2);
        assert_eq!(result.points[0].sum, 1010.0);
        assert_eq!(result.points[1].sum, 1030.0);

        tokio::fs::remove_file(&path).await.ok();
    }
}
