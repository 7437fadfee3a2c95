//! Watch-only monitor that reports newly appearing airdrops

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::adapters::AirdropFeed;
use crate::coordination::ShutdownSignal;
use crate::domain::Airdrop;
use crate::error::FeedError;
use crate::persistence::AirdropStore;

pub struct AirdropMonitor {
    feed: Arc<dyn AirdropFeed>,
    store: AirdropStore,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl AirdropMonitor {
    pub fn new(
        feed: Arc<dyn AirdropFeed>,
        store: AirdropStore,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            feed,
            store,
            interval,
            shutdown,
        }
    }

    /// Poll until shutdown
    pub async fn run(&self) {
        info!("Starting airdrop monitor (interval: {}s)", self.interval.as_secs());
        loop {
            if let Err(e) = self.check_once().await {
                error!("Error checking airdrops: {}", e);
            }
            if self.shutdown.sleep(self.interval).await {
                break;
            }
        }
        info!("Airdrop monitor stopped");
    }

    /// Fetch once and return the airdrops not seen before
    pub async fn check_once(&self) -> Result<Vec<Airdrop>, FeedError> {
        let airdrops = self.feed.fetch_pending().await?;

        let mut fresh = Vec::new();
        for airdrop in airdrops {
            if self.store.exists(&airdrop.id) {
                continue;
            }
            info!(
                airdrop = %airdrop.id,
                "New airdrop: {} ({}), amount {:.2}, ~${}",
                airdrop.token.name,
                airdrop.token.symbol,
                airdrop.display_amount(),
                airdrop.amount_usd
            );
            self.store.save(airdrop.clone());
            fresh.push(airdrop);
        }

        if fresh.is_empty() {
            info!("No new airdrops found");
        }
        Ok(fresh)
    }
}
