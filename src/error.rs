use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("browser init error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("login error: {0}")]
    Auth(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("no usage data: {0}")]
    NoData(String),

    #[error("scrape failed: {0}")]
    Scrape(String),

    #[error("file io error: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
