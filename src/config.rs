use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub username: String,
    pub password: String,
    /// Remote CDP websocket endpoint. When absent, a local browser is launched.
    pub endpoint: Option<String>,
    pub headless: bool,
    pub debug: bool,
    /// Wall-clock budget for one full scrape attempt.
    pub attempt_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            endpoint: None,
            headless: true,
            debug: false,
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl ScraperConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
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

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}
