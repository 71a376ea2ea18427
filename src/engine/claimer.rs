//! Claim executor.
//!
//! Walks the watch-list in priority order (target order, then date order
//! within a target) and claims the first open slot it can. Opening a row
//! whose sign-up control has already vanished is a lost race: the row is
//! collapsed again and the next candidate is tried. At most one slot is
//! claimed per call.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::matcher::SecuredSet;
use crate::config::PortalSettings;
use crate::surface::{PageSurface, SurfaceError, WaitState};
use crate::types::{ListingRecord, SniperError, WatchTarget};

/// Progress of a single (target, date) claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Scanning,
    RowOpened,
    AwaitingAction,
    Claimed,
    RaceLost,
}

pub struct ClaimExecutor<'a, S: PageSurface> {
    surface: &'a S,
    settings: &'a PortalSettings,
}

impl<'a, S: PageSurface> ClaimExecutor<'a, S> {
    pub fn new(surface: &'a S, settings: &'a PortalSettings) -> Self {
        Self { surface, settings }
    }

    /// Claim one slot, or return `None` once every unsecured target and
    /// date has been tried.
    pub async fn snipe(
        &self,
        targets: &[WatchTarget],
        records: &[ListingRecord<S::Element>],
        secured: &SecuredSet,
    ) -> Result<Option<ListingRecord<S::Element>>, SniperError> {
        for target in targets {
            if secured.contains(target) {
                continue;
            }

            let offered = records.iter().any(|r| r.code == target.code && r.is_open());
            if !offered {
                info!(code = %target.code, "No exam with this code is available");
                continue;
            }

            for date in &target.dates {
                let Some(record) = records
                    .iter()
                    .find(|r| r.code == target.code && &r.date == date && r.is_open())
                else {
                    continue;
                };

                info!(code = %record.code, date = %record.date, "Sniping exam");

                match self.attempt(record).await? {
                    AttemptState::Claimed => {
                        info!(
                            code = %record.code,
                            date = %record.date,
                            "You should be signed up"
                        );
                        return Ok(Some(record.clone()));
                    }
                    _ => continue,
                }
            }
        }

        Ok(None)
    }

    /// Drive one attempt to `Claimed` or `RaceLost`.
    async fn attempt(&self, record: &ListingRecord<S::Element>) -> Result<AttemptState, SurfaceError> {
        let mut state = AttemptState::Scanning;
        let action_timeout = self.settings.action_timeout();

        self.surface.click(&record.handle).await?;
        advance(&mut state, AttemptState::RowOpened);

        let visible = self
            .wait_or_timeout(&self.settings.action_selector, WaitState::Visible, action_timeout)
            .await?;

        let control = if visible {
            advance(&mut state, AttemptState::AwaitingAction);
            self.find_signup_control().await?
        } else {
            None
        };

        let Some(control) = control else {
            warn!(
                code = %record.code,
                date = %record.date,
                label = %self.settings.signup_label,
                "Cannot find sign up button"
            );
            // Collapsing is a best-effort reset; a failure here must not end the cycle.
            if let Err(e) = self.collapse(record, action_timeout).await {
                warn!(code = %record.code, date = %record.date, error = %e, "Could not collapse exam row");
            }
            advance(&mut state, AttemptState::RaceLost);
            return Ok(state);
        };

        self.surface.click(&control).await?;

        let loading_timeout = self.settings.loading_timeout();
        let shown = self
            .wait_or_timeout(&self.settings.loading_selector, WaitState::Visible, loading_timeout)
            .await?;
        let cleared = self
            .wait_or_timeout(&self.settings.loading_selector, WaitState::Hidden, loading_timeout)
            .await?;
        if !(shown && cleared) {
            warn!(
                code = %record.code,
                date = %record.date,
                "Sign-up submitted but loading indicator did not settle"
            );
        }

        advance(&mut state, AttemptState::Claimed);
        Ok(state)
    }

    async fn collapse(
        &self,
        record: &ListingRecord<S::Element>,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        self.surface.click(&record.handle).await?;
        self.wait_or_timeout(&self.settings.action_selector, WaitState::Hidden, timeout)
            .await?;
        Ok(())
    }

    /// First primary-action control whose label is exactly the sign-up label.
    async fn find_signup_control(&self) -> Result<Option<S::Element>, SurfaceError> {
        let controls = self
            .surface
            .query_controls(&self.settings.action_selector)
            .await?;

        for control in controls {
            let label = self.surface.read_label(&control).await?;
            if label == self.settings.signup_label {
                return Ok(Some(control));
            }
        }
        Ok(None)
    }

    /// `Ok(false)` when the wait timed out; other surface errors propagate.
    async fn wait_or_timeout(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<bool, SurfaceError> {
        match self.surface.wait_for_selector(selector, state, timeout).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_timeout() => {
                debug!(selector, %state, error = %e, "Wait expired");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn advance(state: &mut AttemptState, next: AttemptState) {
    debug!(from = ?state, to = ?next, "Claim attempt transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::matcher::already_signed;
    use crate::engine::parser::parse_listing;
    use crate::testkit::{FakeClick, FakeElement, FakePage, FakeRow};

    const LABEL: &str = "Přihlásit";

    async fn listing(page: &FakePage) -> Vec<ListingRecord<FakeElement>> {
        let rows = page
            .query_all_rows(&page.settings().row_selector)
            .await
            .unwrap();
        parse_listing(page, rows, page.settings()).await.unwrap()
    }

    async fn snipe(page: &FakePage, targets: &[WatchTarget]) -> Option<ListingRecord<FakeElement>> {
        let records = listing(page).await;
        let secured = already_signed(targets, &records);
        ClaimExecutor::new(page, page.settings())
            .snipe(targets, &records, &secured)
            .await
            .unwrap()
    }

    fn row_click(code: &str, raw: &str) -> FakeClick {
        FakeClick::Row {
            code: Some(code.into()),
            date: Some(raw.into()),
        }
    }

    #[tokio::test]
    async fn test_claims_open_slot() {
        let page = FakePage::new(vec![FakeRow::new("X01", "2024-05-01 - 10:00").open(LABEL)]);
        let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

        let claimed = snipe(&page, &targets).await.unwrap();
        assert_eq!(claimed.code, "X01");
        assert_eq!(claimed.date, "2024-05-01");
        assert_eq!(page.control_clicks(), vec![LABEL.to_string()]);
        assert!(page.rows()[0].signed);
    }

    #[tokio::test]
    async fn test_first_target_wins_over_page_order() {
        let page = FakePage::new(vec![
            FakeRow::new("X02", "2024-04-01 - 08:00").open(LABEL),
            FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
            FakeRow::new("X01", "2024-05-01 - 10:00").open(LABEL),
        ]);
        let targets = vec![
            WatchTarget::new("X01", &["2024-05-01", "2024-05-08"]),
            WatchTarget::new("X02", &["2024-04-01"]),
        ];

        let claimed = snipe(&page, &targets).await.unwrap();
        assert_eq!(claimed.code, "X01");
        assert_eq!(claimed.date, "2024-05-01");
        assert_eq!(page.clicks()[0], row_click("X01", "2024-05-01 - 10:00"));
        // Stops after the first claim.
        assert_eq!(page.control_clicks().len(), 1);
        assert!(!page.rows()[0].signed);
    }

    #[tokio::test]
    async fn test_race_lost_moves_to_next_date() {
        let page = FakePage::new(vec![
            FakeRow::new("X01", "2024-05-01 - 10:00").race_lost(),
            FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
        ]);
        let targets = vec![WatchTarget::new("X01", &["2024-05-01", "2024-05-08"])];

        let claimed = snipe(&page, &targets).await.unwrap();
        assert_eq!(claimed.date, "2024-05-08");

        let clicks = page.clicks();
        // open, collapse, open next, sign up
        assert_eq!(clicks[0], row_click("X01", "2024-05-01 - 10:00"));
        assert_eq!(clicks[1], row_click("X01", "2024-05-01 - 10:00"));
        assert_eq!(clicks[2], row_click("X01", "2024-05-08 - 10:00"));
        assert_eq!(clicks.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_collapse_still_tries_next_date() {
        let page = FakePage::new(vec![
            FakeRow::new("X01", "2024-05-01 - 10:00").race_lost(),
            FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
        ]);
        page.detach_row_on_click(0, 2);
        let targets = vec![WatchTarget::new("X01", &["2024-05-01", "2024-05-08"])];

        let claimed = snipe(&page, &targets).await.unwrap();
        assert_eq!(claimed.date, "2024-05-08");
        assert_eq!(page.control_clicks(), vec![LABEL.to_string()]);
        assert!(page.rows()[1].signed);
    }

    #[tokio::test]
    async fn test_race_lost_moves_to_next_target() {
        let page = FakePage::new(vec![
            FakeRow::new("X01", "2024-05-01 - 10:00").race_lost(),
            FakeRow::new("X02", "2024-05-02 - 10:00").open(LABEL),
        ]);
        let targets = vec![
            WatchTarget::new("X01", &["2024-05-01"]),
            WatchTarget::new("X02", &["2024-05-02"]),
        ];

        let claimed = snipe(&page, &targets).await.unwrap();
        assert_eq!(claimed.code, "X02");
        assert_eq!(page.opened_row(), None);
    }

    #[tokio::test]
    async fn test_race_lost_everywhere_reports_no_claim() {
        let page = FakePage::new(vec![
            FakeRow::new("X01", "2024-05-01 - 10:00").race_lost(),
            FakeRow::new("X01", "2024-05-08 - 10:00").with_controls(&["Odhlásit", "Detail"]),
        ]);
        // Second row has controls, but none carries the sign-up label.
        let mut rows = page.rows();
        rows[1].available = true;
        page.set_rows(rows);

        let targets = vec![WatchTarget::new("X01", &["2024-05-01", "2024-05-08"])];
        assert!(snipe(&page, &targets).await.is_none());
        assert!(page.control_clicks().is_empty());
        assert_eq!(page.opened_row(), None);
    }

    #[tokio::test]
    async fn test_exact_label_match_among_primary_controls() {
        let page = FakePage::new(vec![FakeRow::new("X01", "2024-05-01 - 10:00")
            .open(LABEL)
            .with_controls(&["Přihlásit se později", "Detail", LABEL])]);
        let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

        assert!(snipe(&page, &targets).await.is_some());
        assert_eq!(page.control_clicks(), vec![LABEL.to_string()]);
    }

    #[tokio::test]
    async fn test_secured_target_is_skipped() {
        let page = FakePage::new(vec![
            FakeRow::new("X01", "2024-05-01 - 10:00").signed(),
            FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
            FakeRow::new("X02", "2024-05-02 - 10:00").open(LABEL),
        ]);
        let targets = vec![
            WatchTarget::new("X01", &["2024-05-01", "2024-05-08"]),
            WatchTarget::new("X02", &["2024-05-02"]),
        ];

        let claimed = snipe(&page, &targets).await.unwrap();
        assert_eq!(claimed.code, "X02");
        assert!(page
            .clicks()
            .iter()
            .all(|c| *c != row_click("X01", "2024-05-08 - 10:00")));
    }

    #[tokio::test]
    async fn test_no_offering_means_no_clicks() {
        let page = FakePage::new(vec![FakeRow::new("X01", "2024-05-01 - 10:00")]);
        let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

        assert!(snipe(&page, &targets).await.is_none());
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_open_slot_on_unwatched_date_is_ignored() {
        let page = FakePage::new(vec![FakeRow::new("X01", "2024-07-01 - 10:00").open(LABEL)]);
        let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

        assert!(snipe(&page, &targets).await.is_none());
        assert!(page.clicks().is_empty());
    }
}
