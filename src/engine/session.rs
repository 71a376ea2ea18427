//! Session orchestrator.
//!
//! Sequences one poll cycle over a ready page surface: load the listing,
//! work out what is already secured and, unless every target is, run the
//! claim executor. Holds no state between cycles.

use tracing::{info, warn};

use super::claimer::ClaimExecutor;
use super::matcher::already_signed;
use super::parser::parse_listing;
use crate::config::{validate_targets, PortalSettings};
use crate::surface::{PageSurface, SurfaceError, WaitState};
use crate::types::{CycleOutcome, ListingRecord, SniperError, WatchTarget};

pub struct Session<'a, S: PageSurface> {
    surface: &'a S,
    settings: &'a PortalSettings,
    targets: &'a [WatchTarget],
}

impl<'a, S: PageSurface> Session<'a, S> {
    pub fn new(surface: &'a S, settings: &'a PortalSettings, targets: &'a [WatchTarget]) -> Self {
        Self {
            surface,
            settings,
            targets,
        }
    }

    /// Run one full poll cycle.
    pub async fn poll(&self) -> Result<CycleOutcome, SniperError> {
        if !self.surface.is_ready() {
            return Err(SniperError::SessionNotReady(
                "page surface is not open or not logged in".into(),
            ));
        }
        validate_targets(self.targets)?;

        let records = self.load_listing().await?;
        info!(count = records.len(), "Loaded exam listing");

        let secured = already_signed(self.targets, &records);
        let secured_codes: Vec<&str> = secured.targets().iter().map(|t| t.code.as_str()).collect();
        if secured.is_fully_secured(self.targets.len()) {
            info!(secured = ?secured_codes, "Every watched exam is already secured");
            return Ok(CycleOutcome::AlreadySecured);
        }
        if !secured.is_empty() {
            info!(secured = ?secured_codes, "Skipping exams already signed up for");
        }

        let claimed = ClaimExecutor::new(self.surface, self.settings)
            .snipe(self.targets, &records, &secured)
            .await?;

        Ok(match claimed {
            Some(record) => CycleOutcome::Claimed(record.to_slot()),
            None => {
                info!("No watched exam could be claimed this cycle");
                CycleOutcome::NoneAvailable
            }
        })
    }

    /// Navigate to the exam list, let it finish loading and parse it.
    pub async fn load_listing(&self) -> Result<Vec<ListingRecord<S::Element>>, SniperError> {
        self.surface.navigate(&self.settings.exams_url).await?;

        let timeout = self.settings.loading_timeout();
        for state in [WaitState::Visible, WaitState::Hidden] {
            match self
                .surface
                .wait_for_selector(&self.settings.loading_selector, state, timeout)
                .await
            {
                Ok(()) => {}
                Err(SurfaceError::Timeout { .. }) => {
                    warn!(%state, "Loading indicator wait expired, reading listing anyway");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let rows = self
            .surface
            .query_all_rows(&self.settings.row_selector)
            .await?;
        info!(rows = rows.len(), "Found exam rows");

        Ok(parse_listing(self.surface, rows, self.settings).await?)
    }
}
