//! Per-airdrop USD price history
//!
//! Tracks when each airdrop's reported value last changed and when it was
//! first seen. The stability tiers of the decision policy read from here.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::domain::PriceObservation;

/// Thread-safe price history keyed by airdrop id
#[derive(Debug, Default)]
pub struct PriceTracker {
    history: Mutex<HashMap<String, PriceObservation>>,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the reported USD value at the current time.
    ///
    /// Unparseable values are ignored.
    pub fn record_observation(&self, id: &str, usd_value: &str) {
        self.record_observation_at(id, usd_value, Utc::now());
    }

    pub fn record_observation_at(&self, id: &str, usd_value: &str, now: DateTime<Utc>) {
        let Some(price) = usd_value.trim().parse::<f64>().ok().filter(|p| p.is_finite()) else {
            debug!(airdrop = %id, value = %usd_value, "ignoring unparseable price");
            return;
        };

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        match history.get_mut(id) {
            Some(obs) => {
                if obs.last_price != price {
                    debug!(
                        airdrop = %id,
                        "price changed ${:.4} -> ${:.4}",
                        obs.last_price, price
                    );
                    obs.last_price = price;
                    obs.last_changed = now;
                }
            }
            None => {
                history.insert(id.to_string(), PriceObservation::new(price, now));
            }
        }
    }

    /// Copy of the observation for `id`, if any
    pub fn observation(&self, id: &str) -> Option<PriceObservation> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .copied()
    }

    pub fn tracked_count(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
