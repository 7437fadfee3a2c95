//! Collaborator seams
//!
//! The orchestration core only talks to the outside world through these
//! traits. Production implementations live next to this module; tests use
//! mocks or in-memory fakes.

use async_trait::async_trait;

use crate::domain::{Airdrop, Notification, ProfitSummary, TransactionStats, TxEconomics};
use crate::error::{ClaimError, FeedError, Result, SwapError};

/// Source of pending airdrops for the configured wallet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AirdropFeed: Send + Sync {
    async fn fetch_pending(&self) -> std::result::Result<Vec<Airdrop>, FeedError>;
}

/// Re-acquires platform credentials after an authorization failure
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}

/// Everything needed to build a claim transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub airdrop_id: String,
    pub mint: String,
    pub amount: u64,
    pub proof: Vec<[u8; 32]>,
}

/// Builds, signs and submits claim transactions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimSubmitter: Send + Sync {
    /// Returns the transaction signature
    async fn submit_claim(&self, request: &ClaimRequest) -> std::result::Result<String, ClaimError>;
}

/// A priced route from one mint to another
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Venue payload echoed back when building the swap
    pub raw: serde_json::Value,
}

/// Swap venue (aggregator)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapVenue: Send + Sync {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
    ) -> std::result::Result<SwapQuote, SwapError>;

    /// Build, sign and submit the swap; returns the transaction signature
    async fn execute(
        &self,
        quote: &SwapQuote,
        use_shared_accounts: bool,
    ) -> std::result::Result<String, SwapError>;
}

/// Reads settled transaction economics back from the chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeLookup: Send + Sync {
    /// `None` when the transaction could not be found or parsed
    async fn fees_and_earnings(&self, signature: &str, with_earnings: bool) -> Option<TxEconomics>;
}

/// Operator notifications; failures are logged by the implementation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: Notification);
}

/// Transaction statistics ledger
#[cfg_attr(test, mockall::automock)]
pub trait StatsSink: Send + Sync {
    fn record(&self, stats: &TransactionStats) -> Result<()>;
    fn profit_summary(&self) -> Result<ProfitSummary>;
}

/// USD price of the base asset (SOL)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BasePriceSource: Send + Sync {
    async fn price_usd(&self) -> Option<f64>;
}
