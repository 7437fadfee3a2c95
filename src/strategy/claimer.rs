//! Airdrop claimer
//!
//! Claims a single stored airdrop on-chain, records the claim fee and, when
//! auto-sell is enabled, sells the freshly claimed balance. One submission
//! per call; retries and dedup belong to the caller.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapters::{ClaimRequest, ClaimSubmitter, FeeLookup, Notifier, StatsSink};
use crate::domain::{lamports_to_sol, Airdrop, FigureSource, Notification, SaleReport};
use crate::domain::{TransactionStats, TxKind};
use crate::error::ClaimError;
use crate::persistence::AirdropStore;
use crate::strategy::seller::TokenSeller;

/// Claimer configuration
#[derive(Debug, Clone)]
pub struct ClaimerConfig {
    /// Sell the claimed token for SOL right after claiming
    pub auto_sell: bool,
    /// Wait after submission before reading the transaction back
    pub confirmation_delay: Duration,
}

impl Default for ClaimerConfig {
    fn default() -> Self {
        Self {
            auto_sell: true,
            confirmation_delay: Duration::from_secs(5),
        }
    }
}

/// What happened to the sale that follows a claim
#[derive(Debug, Clone, PartialEq)]
pub enum SaleStatus {
    Disabled,
    Sold(SaleReport),
    Failed(String),
}

/// Result of a successful claim
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimReceipt {
    pub airdrop_id: String,
    pub signature: String,
    /// `None` when the claim could not be read back
    pub fee_lamports: Option<u64>,
    pub sale: SaleStatus,
}

pub struct Claimer {
    store: AirdropStore,
    submitter: Arc<dyn ClaimSubmitter>,
    fees: Arc<dyn FeeLookup>,
    seller: Arc<TokenSeller>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<dyn StatsSink>,
    config: ClaimerConfig,
}

impl Claimer {
    pub fn new(
        store: AirdropStore,
        submitter: Arc<dyn ClaimSubmitter>,
        fees: Arc<dyn FeeLookup>,
        seller: Arc<TokenSeller>,
        notifier: Arc<dyn Notifier>,
        stats: Arc<dyn StatsSink>,
        config: ClaimerConfig,
    ) -> Self {
        Self {
            store,
            submitter,
            fees,
            seller,
            notifier,
            stats,
            config,
        }
    }

    pub fn config(&self) -> &ClaimerConfig {
        &self.config
    }

    /// Claim the stored airdrop `id`, then sell it when auto-sell is on
    pub async fn claim_by_id(&self, id: &str) -> Result<ClaimReceipt, ClaimError> {
        self.claim_by_id_with(id, self.config.auto_sell).await
    }

    /// Same as [`Claimer::claim_by_id`] with an explicit auto-sell choice
    pub async fn claim_by_id_with(
        &self,
        id: &str,
        auto_sell: bool,
    ) -> Result<ClaimReceipt, ClaimError> {
        let airdrop = self
            .store
            .get(id)
            .ok_or_else(|| ClaimError::NotFound(id.to_string()))?;

        if airdrop.claimed_at.is_some() {
            return Err(ClaimError::AlreadyClaimed(id.to_string()));
        }

        let amount = airdrop
            .token_amount()
            .filter(|a| *a > 0)
            .ok_or_else(|| ClaimError::InvalidAmount(airdrop.amount_raw.clone()))?;

        info!(
            airdrop = %airdrop.id,
            "Claiming {} ({}), amount {}",
            airdrop.token.name, airdrop.token.symbol, airdrop.amount_raw
        );

        let request = ClaimRequest {
            airdrop_id: airdrop.id.clone(),
            mint: airdrop.token.address.clone(),
            amount,
            proof: airdrop.proof.clone(),
        };
        let signature = self.submitter.submit_claim(&request).await?;
        info!(airdrop = %airdrop.id, tx = %signature, "Claim transaction submitted");

        if !self.config.confirmation_delay.is_zero() {
            tokio::time::sleep(self.config.confirmation_delay).await;
        }

        let fee_lamports = self.record_claim(&airdrop, &signature).await;

        self.notifier
            .notify(Notification::Claimed {
                token_name: airdrop.token.name.clone(),
                token_symbol: airdrop.token.symbol.clone(),
                amount: airdrop.display_amount(),
                usd_value: airdrop.usd_value().unwrap_or(0.0),
                signature: signature.clone(),
            })
            .await;

        let sale = if auto_sell {
            info!(airdrop = %airdrop.id, "Auto-selling claimed tokens for SOL");
            match self.seller.sell_and_report(&airdrop, fee_lamports).await {
                Ok(report) => SaleStatus::Sold(report),
                Err(e) => {
                    error!(airdrop = %airdrop.id, "Auto-sell failed: {}", e);
                    SaleStatus::Failed(e.to_string())
                }
            }
        } else {
            SaleStatus::Disabled
        };

        Ok(ClaimReceipt {
            airdrop_id: airdrop.id,
            signature,
            fee_lamports,
            sale,
        })
    }

    async fn record_claim(&self, airdrop: &Airdrop, signature: &str) -> Option<u64> {
        let Some(economics) = self.fees.fees_and_earnings(signature, false).await else {
            warn!(tx = %signature, "Failed to read claim transaction fees");
            return None;
        };

        info!(
            tx = %signature,
            "Claim fee: {} lamports ({:.5} SOL)",
            economics.fee_lamports,
            lamports_to_sol(economics.fee_lamports)
        );

        let row = TransactionStats {
            timestamp: Utc::now(),
            kind: TxKind::Claim,
            token_symbol: airdrop.token.symbol.clone(),
            token_amount: airdrop.amount_raw.clone(),
            expenses_lamports: economics.fee_lamports,
            gross_lamports: 0,
            net_lamports: 0,
            signature: signature.to_string(),
            source: FigureSource::Measured,
        };
        if let Err(e) = self.stats.record(&row) {
            warn!("Failed to record claim stats: {}", e);
        }
        Some(economics.fee_lamports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::traits::{
        MockBasePriceSource, MockClaimSubmitter, MockFeeLookup, MockNotifier, MockStatsSink,
        MockSwapVenue,
    };
    use crate::domain::{TokenInfo, TxEconomics};
    use crate::strategy::seller::SellerConfig;

    fn airdrop(id: &str) -> Airdrop {
        Airdrop {
            id: id.to_string(),
            token: TokenInfo {
                name: "Token".to_string(),
                address: "TokenMint111".to_string(),
                symbol: "TOK".to_string(),
                logo_url: None,
            },
            amount_raw: "1000000000".to_string(),
            amount_usd: "0.80".to_string(),
            proof: vec![[1u8; 32], [2u8; 32]],
            claimed_at: None,
            tx_hash: None,
        }
    }

    fn idle_seller() -> Arc<TokenSeller> {
        Arc::new(TokenSeller::new(
            Arc::new(MockSwapVenue::new()),
            Arc::new(MockFeeLookup::new()),
            Arc::new(MockBasePriceSource::new()),
            Arc::new(MockNotifier::new()),
            Arc::new(MockStatsSink::new()),
            SellerConfig::default(),
        ))
    }

    fn no_wait(auto_sell: bool) -> ClaimerConfig {
        ClaimerConfig {
            auto_sell,
            confirmation_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_claimer_config_default() {
        let config = ClaimerConfig::default();
        assert!(config.auto_sell);
        assert_eq!(config.confirmation_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let claimer = Claimer::new(
            AirdropStore::new(),
            Arc::new(MockClaimSubmitter::new()),
            Arc::new(MockFeeLookup::new()),
            idle_seller(),
            Arc::new(MockNotifier::new()),
            Arc::new(MockStatsSink::new()),
            no_wait(false),
        );
        assert_eq!(
            claimer.claim_by_id("nope").await,
            Err(ClaimError::NotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_platform_claimed_airdrop_is_rejected() {
        let store = AirdropStore::new();
        let mut claimed = airdrop("a1");
        claimed.claimed_at = Some(Utc::now());
        store.save(claimed);

        let claimer = Claimer::new(
            store,
            Arc::new(MockClaimSubmitter::new()),
            Arc::new(MockFeeLookup::new()),
            idle_seller(),
            Arc::new(MockNotifier::new()),
            Arc::new(MockStatsSink::new()),
            no_wait(false),
        );
        let err = claimer.claim_by_id("a1").await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_claim_records_fee_and_notifies_without_selling() {
        let store = AirdropStore::new();
        store.save(airdrop("a1"));

        let mut submitter = MockClaimSubmitter::new();
        submitter
            .expect_submit_claim()
            .withf(|req| req.amount == 1_000_000_000 && req.proof.len() == 2)
            .times(1)
            .returning(|_| Ok("claimsig".to_string()));

        let mut fees = MockFeeLookup::new();
        fees.expect_fees_and_earnings()
            .withf(|sig, with_earnings| sig == "claimsig" && !*with_earnings)
            .returning(|_, _| {
                Some(TxEconomics {
                    fee_lamports: 80_000,
                    earnings_lamports: 0,
                })
            });

        let mut stats = MockStatsSink::new();
        stats
            .expect_record()
            .withf(|row| row.kind == TxKind::Claim && row.expenses_lamports == 80_000)
            .times(1)
            .returning(|_| Ok(()));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|e| matches!(e, Notification::Claimed { .. }))
            .times(1)
            .returning(|_| ());

        let claimer = Claimer::new(
            store,
            Arc::new(submitter),
            Arc::new(fees),
            idle_seller(),
            Arc::new(notifier),
            Arc::new(stats),
            no_wait(false),
        );
        let receipt = claimer.claim_by_id("a1").await.unwrap();
        assert_eq!(receipt.signature, "claimsig");
        assert_eq!(receipt.fee_lamports, Some(80_000));
        assert_eq!(receipt.sale, SaleStatus::Disabled);
    }

    #[tokio::test]
    async fn test_submission_error_is_returned_untouched() {
        let store = AirdropStore::new();
        store.save(airdrop("a1"));

        let mut submitter = MockClaimSubmitter::new();
        submitter
            .expect_submit_claim()
            .returning(|_| Err(ClaimError::Network("unexpected EOF".into())));

        let claimer = Claimer::new(
            store,
            Arc::new(submitter),
            Arc::new(MockFeeLookup::new()),
            idle_seller(),
            Arc::new(MockNotifier::new()),
            Arc::new(MockStatsSink::new()),
            no_wait(true),
        );
        assert_eq!(
            claimer.claim_by_id("a1").await,
            Err(ClaimError::Network("unexpected EOF".into()))
        );
    }
}
