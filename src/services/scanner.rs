//! Airdrop scanner
//!
//! Pulls the full pending set from the feed, upserts everything into the
//! store and returns the airdrops at or above a USD threshold.

use std::sync::Arc;
use tracing::{debug, info};

use crate::adapters::AirdropFeed;
use crate::domain::Airdrop;
use crate::error::FeedError;
use crate::persistence::AirdropStore;

/// Threshold used by the orchestration loop so every known airdrop gets its
/// value refreshed
pub const SCAN_ALL_THRESHOLD_USD: f64 = 0.001;

pub struct Scanner {
    feed: Arc<dyn AirdropFeed>,
    store: AirdropStore,
}

impl Scanner {
    pub fn new(feed: Arc<dyn AirdropFeed>, store: AirdropStore) -> Self {
        Self { feed, store }
    }

    pub fn store(&self) -> &AirdropStore {
        &self.store
    }

    /// Fetch, upsert and filter. Airdrops with unparseable values are stored
    /// but never returned.
    pub async fn scan(&self, minimum_usd: f64) -> Result<Vec<Airdrop>, FeedError> {
        let pending = self.feed.fetch_pending().await?;
        let total = pending.len();

        let mut new_count = 0usize;
        let mut matching = Vec::new();
        for airdrop in pending {
            if self.store.save(airdrop.clone()) {
                new_count += 1;
                info!(
                    airdrop = %airdrop.id,
                    "New airdrop: {} ({}) worth ${}",
                    airdrop.token.name, airdrop.token.symbol, airdrop.amount_usd
                );
            }

            match airdrop.usd_value() {
                Some(value) if value >= minimum_usd => matching.push(airdrop),
                Some(_) => {}
                None => debug!(
                    airdrop = %airdrop.id,
                    value = %airdrop.amount_usd,
                    "skipping airdrop with unparseable value"
                ),
            }
        }

        debug!(
            "Scanned {} pending airdrops ({} new, {} above ${})",
            total,
            new_count,
            matching.len(),
            minimum_usd
        );
        Ok(matching)
    }
}
