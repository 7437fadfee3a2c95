//! Local dedup set of handled airdrop ids

use std::collections::HashSet;
use std::sync::Mutex;

/// Ids that must never be claimed or sold again.
///
/// Insert-only; ids are never removed.
#[derive(Debug, Default)]
pub struct ClaimedSet {
    ids: Mutex<HashSet<String>>,
}

impl ClaimedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was newly added
    pub fn insert(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ids with a sale currently running; released when the sale ends
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<String>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `id`; false if a task already holds it
    pub fn try_acquire(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string())
    }

    pub fn release(&self, id: &str) {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }
}
