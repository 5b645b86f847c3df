use chrono::{TimeZone, Utc};
use stw_scraper::{
    reconcile, DebugFileProvider, LastKnownState, StatisticMetadata, UsageProvider,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/usage_data.json".to_string());

    println!("=== Debug Data Test ===");

    let provider = DebugFileProvider::new(&path);
    let usage = match provider.fetch_usage().await {
        Ok(usage) => usage,
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            return;
        }
    };
    println!("Loaded {} days from {}", usage.len(), path);

    let last_known = LastKnownState {
        end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        sum: 0.0,
    };
    let metadata = StatisticMetadata::water_consumption();
    println!(
        "Series {} ({}, unit {})",
        metadata.statistic_id, metadata.name, metadata.unit_of_measurement
    );

    match reconcile(&usage, Some(&last_known)) {
        Ok(points) => {
            for point in &points {
                println!("{}  {:>6.1} L  (total {:.1} L)", point.start, point.state, point.sum);
            }
        }
        Err(e) => eprintln!("Reconcile error: {}", e),
    }
}
