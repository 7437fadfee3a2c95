//! Claim and direct-sell eligibility policy
//!
//! Stateless: every cycle re-evaluates from the airdrop's current value and
//! its price history. Note the operator asymmetry: `>=` for the primary
//! threshold and the direct-sell floor, `>` for the stability floor and the
//! stability windows of the claim tier.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::{Airdrop, PriceObservation};

/// Numeric policy knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    /// Values strictly above this may qualify through the stability tier
    pub stability_floor_usd: f64,
    /// Minimum value for selling a platform-claimed token
    pub direct_sell_floor_usd: f64,
    /// Price must be unchanged (and tracked) for longer than this
    pub stability_window: Duration,
    /// Below the stability window but past this, the airdrop is reported as tracked
    pub tracking_window: Duration,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            stability_floor_usd: 0.07,
            direct_sell_floor_usd: 0.10,
            stability_window: Duration::minutes(10),
            tracking_window: Duration::minutes(5),
        }
    }
}

/// Result of evaluating one airdrop for claiming
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimDecision {
    /// Never observed; wait for the first price read
    NotObserved,
    /// Reported value could not be parsed
    Unpriced,
    /// At or above the configured threshold
    Immediate,
    /// Low value but stable long enough
    Stable,
    /// In the stability band, waiting for the window to elapse
    Tracking { stable_for: Duration, observed_for: Duration },
    /// Not worth claiming
    Below,
}

impl ClaimDecision {
    pub fn is_claim(&self) -> bool {
        matches!(self, ClaimDecision::Immediate | ClaimDecision::Stable)
    }
}

/// Pure eligibility policy
#[derive(Debug, Clone)]
pub struct DecisionMaker {
    minimum_usd_threshold: f64,
    policy: DecisionPolicy,
}

impl DecisionMaker {
    pub fn new(minimum_usd_threshold: f64) -> Self {
        Self::with_policy(minimum_usd_threshold, DecisionPolicy::default())
    }

    pub fn with_policy(minimum_usd_threshold: f64, policy: DecisionPolicy) -> Self {
        Self {
            minimum_usd_threshold,
            policy,
        }
    }

    pub fn minimum_usd_threshold(&self) -> f64 {
        self.minimum_usd_threshold
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn evaluate_claim(
        &self,
        airdrop: &Airdrop,
        observation: Option<&PriceObservation>,
        now: DateTime<Utc>,
    ) -> ClaimDecision {
        let Some(obs) = observation else {
            return ClaimDecision::NotObserved;
        };
        let Some(value) = airdrop.usd_value() else {
            return ClaimDecision::Unpriced;
        };

        if value >= self.minimum_usd_threshold {
            return ClaimDecision::Immediate;
        }
        if value <= self.policy.stability_floor_usd {
            return ClaimDecision::Below;
        }

        let stable_for = obs.stable_for(now);
        let observed_for = obs.observed_for(now);
        if stable_for > self.policy.stability_window && observed_for > self.policy.stability_window
        {
            ClaimDecision::Stable
        } else if stable_for > self.policy.tracking_window
            || observed_for > self.policy.tracking_window
        {
            ClaimDecision::Tracking {
                stable_for,
                observed_for,
            }
        } else {
            ClaimDecision::Below
        }
    }

    /// Whether to claim `airdrop` now
    pub fn should_claim(
        &self,
        airdrop: &Airdrop,
        observation: Option<&PriceObservation>,
        now: DateTime<Utc>,
    ) -> bool {
        let decision = self.evaluate_claim(airdrop, observation, now);
        match decision {
            ClaimDecision::Immediate => info!(
                airdrop = %airdrop.id,
                "{} at ${} meets threshold ${:.2}",
                airdrop.token.symbol, airdrop.amount_usd, self.minimum_usd_threshold
            ),
            ClaimDecision::Stable => info!(
                airdrop = %airdrop.id,
                "{} at ${} has held its price for over {} minutes",
                airdrop.token.symbol,
                airdrop.amount_usd,
                self.policy.stability_window.num_minutes()
            ),
            ClaimDecision::Tracking {
                stable_for,
                observed_for,
            } => info!(
                airdrop = %airdrop.id,
                "Tracking {} at ${}: stable {}m, observed {}m",
                airdrop.token.symbol,
                airdrop.amount_usd,
                stable_for.num_minutes(),
                observed_for.num_minutes()
            ),
            ClaimDecision::NotObserved | ClaimDecision::Unpriced | ClaimDecision::Below => {
                debug!(airdrop = %airdrop.id, ?decision, "not claiming");
            }
        }
        decision.is_claim()
    }

    /// Whether to sell a token the platform already reports as claimed
    pub fn should_sell_directly(
        &self,
        airdrop: &Airdrop,
        observation: Option<&PriceObservation>,
        now: DateTime<Utc>,
    ) -> bool {
        airdrop.claimed_at.is_some() && self.sale_ready(airdrop, observation, now)
    }

    /// Price and value conditions for selling a token already in the wallet
    pub fn sale_ready(
        &self,
        airdrop: &Airdrop,
        observation: Option<&PriceObservation>,
        now: DateTime<Utc>,
    ) -> bool {
        let (Some(obs), Some(value)) = (observation, airdrop.usd_value()) else {
            return false;
        };

        value >= self.policy.direct_sell_floor_usd
            && obs.stable_for(now) >= self.policy.stability_window
            && obs.observed_for(now) >= self.policy.stability_window
    }
}
