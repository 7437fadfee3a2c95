//! In-memory airdrop registry
//!
//! Keyed by airdrop id and shared between the polling loop and sell tasks.
//! Memory-only: the registry is lost on restart and the platform's own
//! `claimed_at` flag is the backstop against re-claiming.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::Airdrop;

#[derive(Debug, Clone)]
struct StoredAirdrop {
    airdrop: Airdrop,
    claimed: bool,
}

/// Concurrent airdrop registry
#[derive(Debug, Clone, Default)]
pub struct AirdropStore {
    entries: Arc<DashMap<String, StoredAirdrop>>,
}

impl AirdropStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert by id. Returns true when the id was not known before.
    ///
    /// Reported fields are overwritten; the local claimed flag survives.
    pub fn save(&self, airdrop: Airdrop) -> bool {
        match self.entries.entry(airdrop.id.clone()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().airdrop = airdrop;
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(StoredAirdrop {
                    airdrop,
                    claimed: false,
                });
                true
            }
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Copy of the stored record
    pub fn get(&self, id: &str) -> Option<Airdrop> {
        self.entries.get(id).map(|e| e.airdrop.clone())
    }

    /// Snapshot of every known airdrop, in no particular order
    pub fn get_all(&self) -> Vec<Airdrop> {
        self.entries.iter().map(|e| e.airdrop.clone()).collect()
    }

    /// Mark an airdrop as locally claimed. Unknown ids are ignored.
    pub fn mark_claimed(&self, id: &str) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.claimed = true;
        }
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.entries.get(id).map(|e| e.claimed).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
