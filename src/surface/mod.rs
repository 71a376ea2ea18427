//! Page interaction surface.
//!
//! Defines the `PageSurface` trait the engine drives: navigation, bounded
//! selector waits, row/control queries, field reads and clicks. The
//! engine consumes nothing else from the browser, which keeps it testable
//! against the scriptable fake in `testkit`.

pub mod chromium;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Condition awaited by [`PageSurface::wait_for_selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// An element matching the selector is present and rendered.
    Visible,
    /// No rendered element matches the selector.
    Hidden,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitState::Visible => write!(f, "visible"),
            WaitState::Hidden => write!(f, "hidden"),
        }
    }
}

/// Failures reported by a page surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// A bounded wait expired. Callers with a fallback treat this as
    /// "not found" and move on.
    #[error("timed out after {timeout_ms}ms waiting for {selector}")]
    Timeout { selector: String, timeout_ms: u64 },

    #[error("browser: {0}")]
    Browser(String),
}

impl SurfaceError {
    pub fn timeout(selector: &str, timeout: Duration) -> Self {
        SurfaceError::Timeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SurfaceError::Timeout { .. })
    }
}

/// Abstraction over a single logged-in portal page.
///
/// Implementors are owned by exactly one session for its duration, so
/// nothing here needs to coordinate concurrent callers.
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Opaque reference to a row or control on the current page.
    type Element: Clone + Send + Sync;

    /// Whether the surface is open and authenticated.
    fn is_ready(&self) -> bool;

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    /// Suspend until `selector` reaches `state`, or fail with
    /// [`SurfaceError::Timeout`] once `timeout` elapses.
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), SurfaceError>;

    /// All listing rows matching `selector`, in page order.
    async fn query_all_rows(&self, selector: &str) -> Result<Vec<Self::Element>, SurfaceError>;

    /// Text of the first descendant of `row` matching `field`, or `None`
    /// when no such descendant exists.
    async fn read_field(
        &self,
        row: &Self::Element,
        field: &str,
    ) -> Result<Option<String>, SurfaceError>;

    async fn click(&self, element: &Self::Element) -> Result<(), SurfaceError>;

    /// All controls matching `selector`, in page order.
    async fn query_controls(&self, selector: &str) -> Result<Vec<Self::Element>, SurfaceError>;

    /// Visible label of a control, trimmed.
    async fn read_label(&self, control: &Self::Element) -> Result<String, SurfaceError>;
}
