//! Target matcher.
//!
//! Works out which watched targets the current listing already shows as
//! claimed. Pure and recomputed every poll; nothing carries over.

use tracing::info;

use crate::types::{ListingRecord, SlotStatus, WatchTarget};

/// Watched targets already satisfied by a claimed record on one of their dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecuredSet {
    targets: Vec<WatchTarget>,
}

impl SecuredSet {
    pub fn contains(&self, target: &WatchTarget) -> bool {
        self.targets.iter().any(|t| t.code == target.code)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[WatchTarget] {
        &self.targets
    }

    /// True only when every configured target is secured.
    pub fn is_fully_secured(&self, configured: usize) -> bool {
        self.targets.len() == configured
    }
}

/// For each target, the first claimed record with the same code on an
/// accepted date secures it. First match wins.
pub fn already_signed<H>(targets: &[WatchTarget], records: &[ListingRecord<H>]) -> SecuredSet {
    let mut secured = Vec::new();

    for target in targets {
        let hit = records.iter().find(|r| {
            r.code == target.code && r.status == SlotStatus::Claimed && target.accepts(&r.date)
        });

        if let Some(record) = hit {
            info!(code = %target.code, date = %record.date, "Already signed up");
            secured.push(target.clone());
        }
    }

    SecuredSet { targets: secured }
}
