use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether economic figures were read back from the chain or estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureSource {
    Measured,
    Estimated,
}

impl FigureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FigureSource::Measured => "measured",
            FigureSource::Estimated => "estimated",
        }
    }
}

impl std::fmt::Display for FigureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction kind recorded in the stats ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Claim,
    Swap,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Claim => "CLAIM",
            TxKind::Swap => "SWAP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLAIM" => Some(TxKind::Claim),
            "SWAP" => Some(TxKind::Swap),
            _ => None,
        }
    }
}

/// Fee and proceeds of a settled transaction, in lamports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxEconomics {
    pub fee_lamports: u64,
    pub earnings_lamports: u64,
}

/// One row of the stats ledger
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStats {
    pub timestamp: DateTime<Utc>,
    pub kind: TxKind,
    pub token_symbol: String,
    /// Raw token amount, as reported
    pub token_amount: String,
    pub expenses_lamports: u64,
    pub gross_lamports: u64,
    pub net_lamports: i64,
    pub signature: String,
    pub source: FigureSource,
}

/// Rolling swap profit, in SOL
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfitSummary {
    pub last_24h: f64,
    pub last_week: f64,
    pub projected_week: f64,
}

/// Outcome of a completed sale
#[derive(Debug, Clone, PartialEq)]
pub struct SaleReport {
    pub signature: String,
    pub fee_lamports: u64,
    pub proceeds_lamports: u64,
    pub source: FigureSource,
    /// Attempt number that succeeded (1-based)
    pub attempts: u32,
}

/// Operator-facing events
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Started {
        wallet: String,
        minimum_usd_threshold: f64,
        check_interval: Duration,
        auto_sell: bool,
    },
    Claimed {
        token_name: String,
        token_symbol: String,
        /// Display amount (already scaled)
        amount: f64,
        usd_value: f64,
        signature: String,
    },
    Sold {
        token_name: String,
        token_symbol: String,
        amount: f64,
        net_profit_sol: f64,
        sol_price_usd: Option<f64>,
        summary: Option<ProfitSummary>,
        source: FigureSource,
        signature: String,
    },
    SaleFailed {
        token_name: String,
        token_symbol: String,
        amount: f64,
        usd_value: f64,
        attempts: u32,
        error: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Started { .. } => "started",
            Notification::Claimed { .. } => "claimed",
            Notification::Sold { .. } => "sold",
            Notification::SaleFailed { .. } => "sale_failed",
        }
    }
}
