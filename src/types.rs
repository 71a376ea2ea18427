//! Shared types for the exam sniper.
//!
//! These types form the data model used across the engine, the page
//! surface and the trigger adapters. Listing records are generic over the
//! surface's element handle so the engine never depends on a browser crate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::surface::SurfaceError;

// ---------------------------------------------------------------------------
// Watch list
// ---------------------------------------------------------------------------

/// A course the operator wants to secure, with acceptable dates in
/// priority order (earlier entries preferred).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    pub code: String,
    pub dates: Vec<String>,
}

impl WatchTarget {
    pub fn new(code: impl Into<String>, dates: &[&str]) -> Self {
        Self {
            code: code.into(),
            dates: dates.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Whether `date` is one of the acceptable dates for this target.
    pub fn accepts(&self, date: &str) -> bool {
        self.dates.iter().any(|d| d == date)
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.code, self.dates.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Availability of a single listed slot, as shown by the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotStatus {
    Unavailable,
    Open,
    Claimed,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Unavailable => write!(f, "UNAVAILABLE"),
            SlotStatus::Open => write!(f, "OPEN"),
            SlotStatus::Claimed => write!(f, "CLAIMED"),
        }
    }
}

/// One parsed row of the portal's exam table.
///
/// `handle` points back at the originating row so the claim executor can
/// click it. Records live for a single poll and are never mutated; a new
/// status is only observed on the next read of the page.
#[derive(Debug, Clone)]
pub struct ListingRecord<H> {
    pub code: String,
    pub date: String,
    pub status: SlotStatus,
    pub handle: H,
}

impl<H> ListingRecord<H> {
    pub fn is_open(&self) -> bool {
        self.status == SlotStatus::Open
    }

    /// Drop the page handle, keeping what callers outside the engine need.
    pub fn to_slot(&self) -> Slot {
        Slot {
            code: self.code.clone(),
            date: self.date.clone(),
        }
    }
}

impl<H> fmt::Display for ListingRecord<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} ({})", self.code, self.date, self.status)
    }
}

/// A claimed exam slot, detached from any page handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub code: String,
    pub date: String,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.code, self.date)
    }
}

// ---------------------------------------------------------------------------
// Cycle outcome
// ---------------------------------------------------------------------------

/// Terminal result of one poll cycle, reported to whichever trigger ran it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every watched target already has a claimed slot.
    AlreadySecured,
    /// A slot was claimed during this cycle.
    Claimed(Slot),
    /// Nothing watched could be claimed this cycle.
    NoneAvailable,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::AlreadySecured => write!(f, "already secured"),
            CycleOutcome::Claimed(slot) => write!(f, "claimed {slot}"),
            CycleOutcome::NoneAvailable => write!(f, "no slot available"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that end a poll cycle and reach the trigger adapter.
///
/// Parse problems and lost claim races never appear here; they are
/// absorbed by the engine and only logged.
#[derive(Debug, thiserror::Error)]
pub enum SniperError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Why a listing row was dropped by the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseWarning {
    #[error("row has no {0} field")]
    MissingField(&'static str),

    #[error("date {0:?} has no separator")]
    MissingSeparator(String),

    #[error("date {0:?} has an empty start")]
    EmptyDate(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
