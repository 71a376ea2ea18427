//! Scriptable in-memory page surface.
//!
//! `FakePage` models the portal's exam table: rows with a code, a raw date
//! text and signed-up/available markers. Clicking a row toggles it open and
//! exposes that row's primary-action controls; clicking the sign-up control
//! flips the row to signed-up and shows the loading indicator, so a second
//! read of the listing observes the claim exactly as the real portal would.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::PortalSettings;
use crate::surface::{PageSurface, SurfaceError, WaitState};

/// Handle to a fake row or control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeElement {
    Row(usize),
    Control { row: usize, index: usize },
}

/// A click observed by the fake, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeClick {
    Row { code: Option<String>, date: Option<String> },
    Control { label: String },
}

/// One scripted row of the exam table.
#[derive(Debug, Clone, Default)]
pub struct FakeRow {
    pub code: Option<String>,
    pub date: Option<String>,
    pub signed: bool,
    pub available: bool,
    /// Labels of the primary-action controls shown while the row is open.
    pub controls: Vec<String>,
}

impl FakeRow {
    /// A row with a code and a raw date text such as `"2024-05-01 - 10:00"`.
    pub fn new(code: &str, raw_date: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            date: Some(raw_date.to_string()),
            ..Default::default()
        }
    }

    /// Mark the row available and give it a working sign-up control.
    pub fn open(mut self, signup_label: &str) -> Self {
        self.available = true;
        self.controls = vec![signup_label.to_string()];
        self
    }

    /// Available row whose sign-up control has vanished by the time the
    /// row is opened.
    pub fn race_lost(mut self) -> Self {
        self.available = true;
        self.controls.clear();
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn with_controls(mut self, labels: &[&str]) -> Self {
        self.controls = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn without_code(mut self) -> Self {
        self.code = None;
        self
    }

    pub fn without_date(mut self) -> Self {
        self.date = None;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    rows: Vec<FakeRow>,
    opened: Option<usize>,
    loading: bool,
    clicks: Vec<FakeClick>,
    navigations: Vec<String>,
    waits: Vec<(String, WaitState)>,
    row_clicks: HashMap<usize, usize>,
    detach_on: Vec<(usize, usize)>,
}

/// In-memory [`PageSurface`] driven by [`FakeRow`] scripts.
pub struct FakePage {
    settings: PortalSettings,
    ready: AtomicBool,
    state: Mutex<FakeState>,
}

impl FakePage {
    /// A ready page using the default portal selectors.
    pub fn new(rows: Vec<FakeRow>) -> Self {
        Self::with_settings(rows, PortalSettings::default())
    }

    pub fn with_settings(rows: Vec<FakeRow>, settings: PortalSettings) -> Self {
        Self {
            settings,
            ready: AtomicBool::new(true),
            state: Mutex::new(FakeState {
                rows,
                ..Default::default()
            }),
        }
    }

    pub fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Replace the table, as if the portal changed between polls.
    pub fn set_rows(&self, rows: Vec<FakeRow>) {
        let mut state = self.lock();
        state.rows = rows;
        state.opened = None;
    }

    /// Make the `nth` click (1-based) on `row` fail as if the node had been
    /// detached from the document.
    pub fn detach_row_on_click(&self, row: usize, nth: usize) {
        self.lock().detach_on.push((row, nth));
    }

    pub fn rows(&self) -> Vec<FakeRow> {
        self.lock().rows.clone()
    }

    pub fn clicks(&self) -> Vec<FakeClick> {
        self.lock().clicks.clone()
    }

    /// Labels of every control clicked so far.
    pub fn control_clicks(&self) -> Vec<String> {
        self.lock()
            .clicks
            .iter()
            .filter_map(|c| match c {
                FakeClick::Control { label } => Some(label.clone()),
                FakeClick::Row { .. } => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn waits(&self) -> Vec<(String, WaitState)> {
        self.lock().waits.clone()
    }

    /// The row currently expanded, if any.
    pub fn opened_row(&self) -> Option<usize> {
        self.lock().opened
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_field(&self, row: &FakeRow, field: &str) -> Option<String> {
        let s = &self.settings;
        if field == s.code_field {
            row.code.clone()
        } else if field == s.date_field {
            row.date.clone()
        } else if field == s.signed_marker {
            row.signed.then(String::new)
        } else if field == s.available_marker {
            row.available.then(String::new)
        } else {
            None
        }
    }
}

#[async_trait]
impl PageSurface for FakePage {
    type Element = FakeElement;

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        state.opened = None;
        state.loading = true;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        wait: WaitState,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        state.waits.push((selector.to_string(), wait));

        let visible = if selector == self.settings.loading_selector {
            state.loading
        } else if selector == self.settings.action_selector {
            state
                .opened
                .map(|i| !state.rows[i].controls.is_empty())
                .unwrap_or(false)
        } else {
            false
        };

        match (wait, visible) {
            (WaitState::Visible, true) => Ok(()),
            (WaitState::Hidden, true) if selector == self.settings.loading_selector => {
                state.loading = false;
                Ok(())
            }
            (WaitState::Hidden, false) => Ok(()),
            _ => Err(SurfaceError::timeout(selector, timeout)),
        }
    }

    async fn query_all_rows(&self, selector: &str) -> Result<Vec<FakeElement>, SurfaceError> {
        if selector != self.settings.row_selector {
            return Ok(Vec::new());
        }
        let state = self.lock();
        Ok((0..state.rows.len()).map(FakeElement::Row).collect())
    }

    async fn read_field(
        &self,
        row: &FakeElement,
        field: &str,
    ) -> Result<Option<String>, SurfaceError> {
        let state = self.lock();
        match row {
            FakeElement::Row(i) => {
                let row = state
                    .rows
                    .get(*i)
                    .ok_or_else(|| SurfaceError::Browser(format!("row {i} detached")))?;
                Ok(self.row_field(row, field))
            }
            FakeElement::Control { .. } => Ok(None),
        }
    }

    async fn click(&self, element: &FakeElement) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        match *element {
            FakeElement::Row(i) => {
                let nth = {
                    let count = state.row_clicks.entry(i).or_insert(0);
                    *count += 1;
                    *count
                };
                if state.detach_on.contains(&(i, nth)) {
                    return Err(SurfaceError::Browser("Node is detached from document".into()));
                }
                let row = state
                    .rows
                    .get(i)
                    .ok_or_else(|| SurfaceError::Browser(format!("row {i} detached")))?;
                let click = FakeClick::Row {
                    code: row.code.clone(),
                    date: row.date.clone(),
                };
                state.clicks.push(click);
                state.opened = if state.opened == Some(i) { None } else { Some(i) };
            }
            FakeElement::Control { row, index } => {
                if state.opened != Some(row) {
                    return Err(SurfaceError::Browser("control is not attached".into()));
                }
                let label = state.rows[row]
                    .controls
                    .get(index)
                    .cloned()
                    .ok_or_else(|| SurfaceError::Browser("control is not attached".into()))?;
                state.clicks.push(FakeClick::Control {
                    label: label.clone(),
                });
                if label == self.settings.signup_label {
                    let target = &mut state.rows[row];
                    target.signed = true;
                    target.available = false;
                    target.controls.clear();
                    state.opened = None;
                    state.loading = true;
                }
            }
        }
        Ok(())
    }

    async fn query_controls(&self, selector: &str) -> Result<Vec<FakeElement>, SurfaceError> {
        if selector != self.settings.action_selector {
            return Ok(Vec::new());
        }
        let state = self.lock();
        Ok(match state.opened {
            Some(row) => (0..state.rows[row].controls.len())
                .map(|index| FakeElement::Control { row, index })
                .collect(),
            None => Vec::new(),
        })
    }

    async fn read_label(&self, control: &FakeElement) -> Result<String, SurfaceError> {
        let state = self.lock();
        match *control {
            FakeElement::Control { row, index } => state
                .rows
                .get(row)
                .and_then(|r| r.controls.get(index))
                .map(|l| l.trim().to_string())
                .ok_or_else(|| SurfaceError::Browser("control is not attached".into())),
            FakeElement::Row(_) => Err(SurfaceError::Browser("not a control".into())),
        }
    }
}
