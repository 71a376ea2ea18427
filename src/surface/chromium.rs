//! Chromium-backed page surface using chromiumoxide.
//!
//! `BrowserSession` owns the browser process and its single page for the
//! duration of one cycle; `ChromiumSurface` is the `PageSurface` the engine
//! drives. The surface only reports ready once login has gone through.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PageSurface, SurfaceError, WaitState};
use crate::config::{BrowserSettings, Credentials, PortalSettings};
use crate::types::SniperError;

const USERNAME_INPUT: &str = r#"input[id="username"]"#;
const PASSWORD_INPUT: &str = r#"input[id="password"]"#;
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Interval between DOM probes while waiting on a selector.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn browser_err(e: CdpError) -> SurfaceError {
    SurfaceError::Browser(e.to_string())
}

/// A launched headless browser with one open page.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    surface: ChromiumSurface,
}

impl BrowserSession {
    /// Launch Chromium and open a blank page.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, SniperError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| SniperError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SniperError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SniperError::Browser(format!("failed to open page: {e}")))?;

        debug!(headless = settings.headless, "Browser launched");

        Ok(Self {
            browser,
            handler,
            surface: ChromiumSurface::new(page),
        })
    }

    pub fn surface(&self) -> &ChromiumSurface {
        &self.surface
    }

    /// Submit the portal's login form and wait for the redirect.
    pub async fn login(
        &self,
        credentials: &Credentials,
        settings: &PortalSettings,
    ) -> Result<(), SniperError> {
        credentials.validate()?;
        let page = &self.surface.page;
        let auth = |e: CdpError| SniperError::Authentication(e.to_string());

        info!(username = %credentials.username, "Logging in");
        page.goto(settings.login_url.as_str()).await.map_err(auth)?;

        let username = page.find_element(USERNAME_INPUT).await.map_err(auth)?;
        username.click().await.map_err(auth)?;
        username
            .type_str(&credentials.username)
            .await
            .map_err(auth)?;

        let password = page.find_element(PASSWORD_INPUT).await.map_err(auth)?;
        password.click().await.map_err(auth)?;
        password
            .type_str(credentials.password.expose_secret())
            .await
            .map_err(auth)?;

        page.find_element(SUBMIT_BUTTON)
            .await
            .map_err(auth)?
            .click()
            .await
            .map_err(auth)?;

        tokio::time::timeout(settings.loading_timeout(), page.wait_for_navigation())
            .await
            .map_err(|_| SniperError::Authentication("login navigation timed out".into()))?
            .map_err(auth)?;

        if page.find_element(USERNAME_INPUT).await.is_ok() {
            return Err(SniperError::Authentication(
                "still on the login form after submitting".into(),
            ));
        }

        self.surface.ready.store(true, Ordering::SeqCst);
        info!("Logged in");
        Ok(())
    }

    /// Close the browser and stop its event handler.
    pub async fn close(mut self) {
        self.surface.ready.store(false, Ordering::SeqCst);
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        debug!("Browser closed");
    }
}

/// `PageSurface` over a single chromiumoxide page.
pub struct ChromiumSurface {
    page: Page,
    ready: AtomicBool,
}

impl ChromiumSurface {
    fn new(page: Page) -> Self {
        Self {
            page,
            ready: AtomicBool::new(false),
        }
    }

    /// Whether `selector` currently matches a rendered element, using the
    /// same visibility rules as puppeteer's `waitForSelector`.
    async fn is_visible(&self, selector: &str) -> Result<bool, SurfaceError> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| SurfaceError::Browser(e.to_string()))?;
        let probe = format!(
            "(() => {{ const el = document.querySelector({quoted}); \
             if (!el) return false; \
             const style = window.getComputedStyle(el); \
             const rect = el.getBoundingClientRect(); \
             return style.visibility !== 'hidden' && !!(rect.width || rect.height); }})()"
        );
        self.page
            .evaluate(probe)
            .await
            .map_err(browser_err)?
            .into_value::<bool>()
            .map_err(|e| SurfaceError::Browser(e.to_string()))
    }

    async fn text_content(element: &Element) -> Result<String, SurfaceError> {
        let returns = element
            .call_js_fn("function() { return (this.textContent || '').trim(); }", false)
            .await
            .map_err(browser_err)?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }
}

#[async_trait]
impl PageSurface for ChromiumSurface {
    type Element = Arc<Element>;

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        let want_visible = state == WaitState::Visible;
        let poll = async {
            loop {
                if self.is_visible(selector).await? == want_visible {
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Ok::<(), SurfaceError>(())
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::timeout(selector, timeout)),
        }
    }

    async fn query_all_rows(&self, selector: &str) -> Result<Vec<Arc<Element>>, SurfaceError> {
        let rows = self.page.find_elements(selector).await.map_err(browser_err)?;
        Ok(rows.into_iter().map(Arc::new).collect())
    }

    async fn read_field(
        &self,
        row: &Arc<Element>,
        field: &str,
    ) -> Result<Option<String>, SurfaceError> {
        let found = row.find_elements(field).await.map_err(browser_err)?;
        match found.first() {
            Some(element) => Ok(Some(Self::text_content(element).await?)),
            None => Ok(None),
        }
    }

    async fn click(&self, element: &Arc<Element>) -> Result<(), SurfaceError> {
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn query_controls(&self, selector: &str) -> Result<Vec<Arc<Element>>, SurfaceError> {
        self.query_all_rows(selector).await
    }

    async fn read_label(&self, control: &Arc<Element>) -> Result<String, SurfaceError> {
        Self::text_content(control).await
    }
}
