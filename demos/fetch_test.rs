use stw_scraper::{fetch_usage, reconcile, ScraperConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let username =
        std::env::var("WATER_USERNAME").expect("WATER_USERNAME environment variable not set");
    let password =
        std::env::var("WATER_PASSWORD").expect("WATER_PASSWORD environment variable not set");

    let mut config = ScraperConfig::new(&username, &password).with_headless(false);
    if let Ok(endpoint) = std::env::var("CDP_ENDPOINT") {
        config = config.with_endpoint(endpoint);
    }

    println!("=== ST Water Fetch Test ===");

    match fetch_usage(&config).await {
        Ok(usage) => {
            println!("Fetched {} days", usage.len());
            let points = reconcile(&usage, None).unwrap();
            for point in &points {
                println!("{}  {:>6.1} L  (total {:.1} L)", point.start, point.state, point.sum);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
        }
    }
}
