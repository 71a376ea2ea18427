//! Cycle runner.
//!
//! One poll cycle end to end: launch the browser, log in, run the
//! session, close the browser. Both trigger adapters (the interval
//! scheduler and the HTTP endpoint) only talk to the `CycleRunner` trait.

use async_trait::async_trait;
use tracing::{info_span, Instrument};

use crate::config::{validate_targets, Credentials, PortalSettings};
use crate::engine::Session;
use crate::surface::chromium::BrowserSession;
use crate::types::{CycleOutcome, SniperError, WatchTarget};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Run exactly one poll cycle for `targets`.
    async fn run_cycle(
        &self,
        credentials: &Credentials,
        targets: &[WatchTarget],
    ) -> Result<CycleOutcome, SniperError>;
}

/// Runs each cycle in a fresh headless Chromium.
pub struct BrowserRunner {
    settings: PortalSettings,
}

impl BrowserRunner {
    pub fn new(settings: PortalSettings) -> Self {
        Self { settings }
    }

    async fn run(
        &self,
        credentials: &Credentials,
        targets: &[WatchTarget],
    ) -> Result<CycleOutcome, SniperError> {
        credentials.validate()?;
        validate_targets(targets)?;

        let browser = BrowserSession::launch(&self.settings.browser).await?;

        let result = match browser.login(credentials, &self.settings).await {
            Ok(()) => {
                Session::new(browser.surface(), &self.settings, targets)
                    .poll()
                    .await
            }
            Err(e) => Err(e),
        };

        browser.close().await;
        result
    }
}

// Outcomes and failures are logged by the trigger adapter.
#[async_trait]
impl CycleRunner for BrowserRunner {
    async fn run_cycle(
        &self,
        credentials: &Credentials,
        targets: &[WatchTarget],
    ) -> Result<CycleOutcome, SniperError> {
        let span = info_span!("cycle", id = %uuid::Uuid::new_v4());
        self.run(credentials, targets).instrument(span).await
    }
}
