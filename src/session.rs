//! Browser session against the ST Water customer portal.
//!
//! One [`PortalDriver`] owns one authenticated browser session for one scrape
//! attempt. All the fragile, UI-structure-dependent selectors live here and
//! in [`crate::extract`]; everything above talks to the [`SessionDriver`]
//! trait so it can be mocked.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::extract;

const LOGIN_PAGE: &str = "https://myaccount.stwater.co.uk/login";

/// Bounded wait for the post-login landing marker.
const LANDING_WAIT_SECS: u64 = 20;
/// Bounded wait for widgets and paging transitions.
const NAV_WAIT_SECS: u64 = 10;
/// Bounded wait for the optional cookie-consent overlay.
const COOKIE_WAIT_SECS: u64 = 5;

const POLL_INTERVAL_MS: u64 = 250;

/// The portal session as the orchestrator sees it.
///
/// State machine: unauthenticated -> authenticated (`login`) -> day view open
/// (`open_daily_view`) -> paged backwards (`advance_to_previous_day`) ->
/// closed. `close` must be safe from any state and safe to call repeatedly.
#[async_trait]
pub trait SessionDriver: Send {
    /// Log in and wait for the landing page.
    async fn login(&mut self) -> Result<(), ScraperError>;

    /// Navigate to the consumption-history widget and switch it to "Day".
    async fn open_daily_view(&mut self) -> Result<(), ScraperError>;

    /// Read the displayed day: raw heading plus raw hourly usage labels.
    async fn read_day(&mut self) -> Result<(String, Vec<String>), ScraperError>;

    /// Page one day back. `Ok(false)` means no more historical data, which
    /// terminates the scrape loop; it is not an error.
    async fn advance_to_previous_day(&mut self) -> Result<bool, ScraperError>;

    /// Release the browser session.
    async fn close(&mut self) -> Result<(), ScraperError>;
}

pub struct PortalDriver {
    config: ScraperConfig,
    browser: Option<Browser>,
    page: Option<Arc<Page>>,
}

impl PortalDriver {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
        }
    }

    fn get_page(&self) -> Result<&Arc<Page>, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("browser not initialized".into()))
    }

    /// Launch a local browser, or attach to the configured CDP endpoint.
    async fn initialize(&mut self) -> Result<(), ScraperError> {
        let (browser, mut handler) = match &self.config.endpoint {
            Some(endpoint) => {
                info!("connecting to remote browser at {}", endpoint);
                Browser::connect(endpoint.clone())
                    .await
                    .map_err(|e| ScraperError::BrowserInit(e.to_string()))?
            }
            None => {
                info!("launching local browser");
                let mut builder = BrowserConfig::builder()
                    .window_size(1280, 800)
                    .no_sandbox()
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage");

                if self.config.headless {
                    builder = builder.arg("--headless=new");
                }

                let browser_config = builder.build().map_err(ScraperError::BrowserInit)?;

                Browser::launch(browser_config)
                    .await
                    .map_err(|e| ScraperError::BrowserInit(e.to_string()))?
            }
        };

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(Arc::new(page));
        Ok(())
    }

    /// The consent overlay does not always appear; absence is fine.
    async fn dismiss_cookie_overlay(&self, page: &Page) {
        debug!("waiting for cookie overlay");
        let deadline = std::time::Instant::now() + Duration::from_secs(COOKIE_WAIT_SECS);
        loop {
            let clicked: bool = page
                .evaluate(
                    r#"
                    (function() {
                        var overlay = document.querySelector('.cookie-request-container');
                        if (overlay) {
                            overlay.click();
                            return true;
                        }
                        return false;
                    })()
                    "#,
                )
                .await
                .map(|v| v.into_value().unwrap_or(false))
                .unwrap_or(false);

            if clicked {
                debug!("cookie overlay dismissed");
                return;
            }
            if std::time::Instant::now() >= deadline {
                warn!("cookie overlay not found, continuing without it");
                return;
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn debug_screenshot(&self, page: &Page, label: &str) {
        if !self.config.debug {
            return;
        }
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
        }
    }

    async fn current_heading(&self, page: &Page) -> Result<String, ScraperError> {
        let heading: String = page
            .evaluate(
                r#"
                (function() {
                    var el = document.querySelector('.consumption-history .period-dates');
                    return el ? el.textContent.trim() : '';
                })()
                "#,
            )
            .await
            .map_err(|e| ScraperError::Navigation(format!("reading period heading: {}", e)))?
            .into_value()
            .unwrap_or_default();
        Ok(heading)
    }
}

#[async_trait]
impl SessionDriver for PortalDriver {
    async fn login(&mut self) -> Result<(), ScraperError> {
        if self.browser.is_none() {
            self.initialize().await?;
        }
        let page = self.get_page()?.clone();
        info!("logging in as {}", self.config.username);

        page.goto(LOGIN_PAGE)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        debug!("login page loaded");

        self.dismiss_cookie_overlay(&page).await;

        // The login form renders client-side; give it the same bounded wait
        // as any other widget before touching its fields.
        let form_ready = wait_for_js(
            &page,
            "document.querySelector('#username') !== null && document.querySelector('#password') !== null",
            Duration::from_secs(NAV_WAIT_SECS),
        )
        .await;
        if !form_ready {
            self.debug_screenshot(&page, "login form missing").await;
            return Err(ScraperError::ElementNotFound(format!(
                "login form did not appear within {}s",
                NAV_WAIT_SECS
            )));
        }

        page.find_element("#username")
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("username field: {}", e)))?
            .type_str(&self.config.username)
            .await
            .map_err(|e| ScraperError::Auth(format!("typing username: {}", e)))?;

        page.find_element("#password")
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("password field: {}", e)))?
            .type_str(&self.config.password)
            .await
            .map_err(|e| ScraperError::Auth(format!("typing password: {}", e)))?;

        page.find_element("button[type='submit']")
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("login button: {}", e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Auth(format!("clicking login button: {}", e)))?;
        debug!("credentials submitted, waiting for landing page");

        // The smart tracker link is the landing marker for a successful login.
        let landed = wait_for_js(
            &page,
            r#"
            (function() {
                var links = document.querySelectorAll('a');
                for (var i = 0; i < links.length; i++) {
                    if (links[i].textContent.trim() === 'MY SMART TRACKER') {
                        return true;
                    }
                }
                return false;
            })()
            "#,
            Duration::from_secs(LANDING_WAIT_SECS),
        )
        .await;

        if !landed {
            self.debug_screenshot(&page, "login failure").await;
            return Err(ScraperError::Auth(format!(
                "landing page did not appear within {}s",
                LANDING_WAIT_SECS
            )));
        }

        info!("login complete");
        Ok(())
    }

    async fn open_daily_view(&mut self) -> Result<(), ScraperError> {
        let page = self.get_page()?.clone();
        info!("opening daily consumption view");

        let clicked: bool = page
            .evaluate(
                r#"
                (function() {
                    var links = document.querySelectorAll('a');
                    for (var i = 0; i < links.length; i++) {
                        if (links[i].textContent.trim() === 'MY SMART TRACKER') {
                            links[i].click();
                            return true;
                        }
                    }
                    return false;
                })()
                "#,
            )
            .await
            .map(|v| v.into_value().unwrap_or(false))
            .unwrap_or(false);
        if !clicked {
            return Err(ScraperError::ElementNotFound("smart tracker link".into()));
        }

        let widget_ready = wait_for_js(
            &page,
            "document.querySelector('.consumption-history') !== null",
            Duration::from_secs(NAV_WAIT_SECS),
        )
        .await;
        if !widget_ready {
            return Err(ScraperError::Navigation(format!(
                "consumption-history widget did not appear within {}s",
                NAV_WAIT_SECS
            )));
        }

        // Switch the reporting granularity to "Day".
        let day_clicked = wait_for_js(
            &page,
            r#"
            (function() {
                var widget = document.querySelector('.consumption-history');
                var buttons = widget.querySelectorAll('.button-reset');
                for (var i = 0; i < buttons.length; i++) {
                    if (buttons[i].textContent.trim() === 'Day') {
                        buttons[i].click();
                        return true;
                    }
                }
                return false;
            })()
            "#,
            Duration::from_secs(NAV_WAIT_SECS),
        )
        .await;
        if !day_clicked {
            return Err(ScraperError::Navigation(
                "day granularity button not found".into(),
            ));
        }

        let heading_ready = wait_for_js(
            &page,
            "document.querySelector('.consumption-history .period-dates') !== null",
            Duration::from_secs(NAV_WAIT_SECS),
        )
        .await;
        if !heading_ready {
            return Err(ScraperError::Navigation(format!(
                "day view heading did not appear within {}s",
                NAV_WAIT_SECS
            )));
        }

        info!("daily view open");
        Ok(())
    }

    async fn read_day(&mut self) -> Result<(String, Vec<String>), ScraperError> {
        let page = self.get_page()?.clone();
        extract::read_day(&page).await
    }

    async fn advance_to_previous_day(&mut self) -> Result<bool, ScraperError> {
        let page = self.get_page()?.clone();
        let before = self.current_heading(&page).await?;

        let state: String = page
            .evaluate(
                r#"
                (function() {
                    var btn = document.querySelector("button[aria-label='Previous period range']");
                    if (!btn) {
                        return 'missing';
                    }
                    if (btn.disabled || btn.className.indexOf('disabled') >= 0) {
                        return 'disabled';
                    }
                    btn.click();
                    return 'clicked';
                })()
                "#,
            )
            .await
            .map_err(|e| ScraperError::Navigation(format!("previous period button: {}", e)))?
            .into_value()
            .unwrap_or_default();

        // A missing or disabled paging control is the end of the history,
        // not a failure.
        if state != "clicked" {
            debug!("no more historical data ({})", state);
            return Ok(false);
        }

        let changed = wait_for_js(
            &page,
            &format!(
                r#"
                (function() {{
                    var el = document.querySelector('.consumption-history .period-dates');
                    return el !== null && el.textContent.trim() !== {};
                }})()
                "#,
                serde_json::to_string(&before)?
            ),
            Duration::from_secs(NAV_WAIT_SECS),
        )
        .await;
        if !changed {
            return Err(ScraperError::Timeout(format!(
                "day view did not move past {:?} within {}s",
                before, NAV_WAIT_SECS
            )));
        }

        debug!("paged back from {:?}", before);
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("error closing browser: {}", e);
            }
            info!("browser session closed");
        }
        Ok(())
    }
}

/// Poll a boolean page expression until it holds or the wait runs out.
async fn wait_for_js(page: &Page, script: &str, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    loop {
        let ready: bool = page
            .evaluate(script)
            .await
            .map(|v| v.into_value().unwrap_or(false))
            .unwrap_or(false);
        if ready {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_driver_new() {
        let config = ScraperConfig::new("test_user", "test_password");
        let driver = PortalDriver::new(config);
        assert!(driver.browser.is_none());
        assert!(driver.page.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_before_init() {
        let mut driver = PortalDriver::new(ScraperConfig::new("u", "p"));
        driver.close().await.unwrap();
        driver.close().await.unwrap();
    }
}
