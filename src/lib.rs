//! ST Water usage scraper
//!
//! Scrapes hourly water consumption from the ST Water customer portal (no
//! public API; interactive login only) and turns it into a monotonically
//! increasing cumulative series for a long-term statistics store.
//!
//! - Drives a browser (local or remote CDP endpoint) through login, the
//!   smart tracker, and the per-day consumption chart
//! - Parses the chart's accessible labels into hourly litre samples
//! - Reconciles them against the last persisted point without gaps,
//!   duplicates, or regressions
//!
//! # Live fetch example
//!
//! ```rust,ignore
//! use stw_scraper::{FetchRequest, UsageService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = UsageService::new();
//!
//!     let request = FetchRequest::new("user", "password")
//!         .with_endpoint("ws://selenium-host:9222")
//!         .with_headless(true);
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("{} new points", result.points.len());
//! }
//! ```
//!
//! # Debug data example
//!
//! ```rust,ignore
//! use stw_scraper::{DebugFileProvider, UsageProvider, reconcile};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = DebugFileProvider::new("./data/usage_data.json");
//!     let usage = provider.fetch_usage().await.unwrap();
//!     let points = reconcile(&usage, None).unwrap();
//!     println!("{} points from debug data", points.len());
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod parse;
pub mod provider;
pub mod reconcile;
pub mod service;
pub mod session;
pub mod sink;
pub mod types;

// Re-export the main types
pub use config::ScraperConfig;
pub use error::ScraperError;
pub use orchestrator::fetch_usage;
pub use provider::{DebugFileProvider, LiveProvider, UsageProvider};
pub use reconcile::reconcile;
pub use service::{FetchRequest, FetchResult, UsageService};
pub use session::{PortalDriver, SessionDriver};
pub use sink::StatisticsSink;
pub use types::{CumulativePoint, DayUsage, LastKnownState, StatisticMetadata, UsageMap};
