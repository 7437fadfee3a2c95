use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Token decimals assumed for airdropped tokens when displaying amounts
pub const TOKEN_DISPLAY_DECIMALS: i32 = 9;

/// Token metadata attached to an airdrop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    /// Mint address (base58)
    pub address: String,
    pub symbol: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// A pending airdrop allocation reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airdrop {
    /// Unique, stable identifier assigned by the platform
    pub id: String,
    pub token: TokenInfo,
    /// Token amount in smallest units, as reported
    pub amount_raw: String,
    /// USD value, as reported
    pub amount_usd: String,
    /// Merkle proof nodes for the on-chain claim
    #[serde(default)]
    pub proof: Vec<[u8; 32]>,
    /// Set when the platform already considers the airdrop claimed
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Claim transaction reported by the platform, if any
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl Airdrop {
    /// Parsed USD value; `None` when the platform sent something unparseable
    pub fn usd_value(&self) -> Option<f64> {
        self.amount_usd
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    /// Parsed token amount in smallest units
    pub fn token_amount(&self) -> Option<u64> {
        self.amount_raw.trim().parse::<u64>().ok()
    }

    /// Token amount scaled for display
    pub fn display_amount(&self) -> f64 {
        let raw = self.amount_raw.trim().parse::<f64>().unwrap_or(0.0);
        raw / 10f64.powi(TOKEN_DISPLAY_DECIMALS)
    }

    pub fn is_platform_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }
}

/// Per-airdrop price history used for stability decisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub last_price: f64,
    /// When `last_price` last changed
    pub last_changed: DateTime<Utc>,
    /// When the airdrop was first observed; never moves
    pub first_observed: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(price: f64, now: DateTime<Utc>) -> Self {
        Self {
            last_price: price,
            last_changed: now,
            first_observed: now,
        }
    }

    /// How long the price has been unchanged
    pub fn stable_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_changed
    }

    /// How long the airdrop has been tracked
    pub fn observed_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.first_observed
    }
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn signed_lamports_to_sol(lamports: i64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
