//! Token seller
//!
//! Swaps a claimed token balance for SOL through the swap venue with a fixed
//! retry budget, then reads fees and proceeds back from the chain. When the
//! transaction cannot be read back the figures are estimated from the SOL
//! spot price and flagged as such.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::adapters::{BasePriceSource, FeeLookup, Notifier, StatsSink, SwapVenue};
use crate::domain::{
    lamports_to_sol, signed_lamports_to_sol, Airdrop, FigureSource, Notification, SaleReport,
    TransactionStats, TxKind, LAMPORTS_PER_SOL,
};
use crate::error::{SellError, SwapError};

/// Wrapped SOL mint
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Fee assumed when the swap transaction cannot be read back
pub const ESTIMATED_SWAP_FEE_LAMPORTS: u64 = 5_000;

/// Max characters of an error forwarded to notifications
const NOTIFY_ERROR_LIMIT: usize = 100;

/// Retry budget for a single sale
#[derive(Debug, Clone)]
pub struct SellerConfig {
    pub base_mint: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Wait before reading the swap transaction back
    pub settle_delay: Duration,
}

impl Default for SellerConfig {
    fn default() -> Self {
        Self {
            base_mint: WSOL_MINT.to_string(),
            max_attempts: 10,
            retry_delay: Duration::from_secs(3),
            settle_delay: Duration::from_secs(2),
        }
    }
}

pub struct TokenSeller {
    venue: Arc<dyn SwapVenue>,
    fees: Arc<dyn FeeLookup>,
    prices: Arc<dyn BasePriceSource>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<dyn StatsSink>,
    config: SellerConfig,
}

impl TokenSeller {
    pub fn new(
        venue: Arc<dyn SwapVenue>,
        fees: Arc<dyn FeeLookup>,
        prices: Arc<dyn BasePriceSource>,
        notifier: Arc<dyn Notifier>,
        stats: Arc<dyn StatsSink>,
        config: SellerConfig,
    ) -> Self {
        Self {
            venue,
            fees,
            prices,
            notifier,
            stats,
            config,
        }
    }

    pub fn config(&self) -> &SellerConfig {
        &self.config
    }

    /// Swap the airdrop's token balance for SOL.
    ///
    /// No notification or stats side effects; see [`TokenSeller::sell_and_report`].
    pub async fn sell_token(&self, airdrop: &Airdrop) -> Result<SaleReport, SellError> {
        let amount = airdrop
            .token_amount()
            .filter(|a| *a > 0)
            .ok_or_else(|| SellError::InvalidAmount(airdrop.amount_raw.clone()))?;

        info!(
            airdrop = %airdrop.id,
            "Selling {} ({}) worth ${}",
            airdrop.token.name, airdrop.token.symbol, airdrop.amount_usd
        );

        let (signature, attempts) = self.swap_with_retries(&airdrop.token.address, amount).await?;

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let report = match self.fees.fees_and_earnings(&signature, true).await {
            Some(economics) => SaleReport {
                signature,
                fee_lamports: economics.fee_lamports,
                proceeds_lamports: economics.earnings_lamports,
                source: FigureSource::Measured,
                attempts,
            },
            None => {
                warn!(tx = %signature, "swap not readable yet, estimating proceeds");
                SaleReport {
                    proceeds_lamports: self.estimate_proceeds(airdrop).await,
                    signature,
                    fee_lamports: ESTIMATED_SWAP_FEE_LAMPORTS,
                    source: FigureSource::Estimated,
                    attempts,
                }
            }
        };

        info!(
            airdrop = %airdrop.id,
            tx = %report.signature,
            "Sold {} for {:.6} SOL (fee {:.6} SOL, {})",
            airdrop.token.symbol,
            lamports_to_sol(report.proceeds_lamports),
            lamports_to_sol(report.fee_lamports),
            report.source
        );
        Ok(report)
    }

    /// Quote and submit until one attempt lands or the budget runs out.
    ///
    /// Returns the signature and the 1-based attempt that succeeded. Once the
    /// venue rejects shared accounts they stay off for the rest of the call.
    pub async fn swap_with_retries(
        &self,
        input_mint: &str,
        amount: u64,
    ) -> Result<(String, u32), SellError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut use_shared_accounts = true;
        let mut last_error = SwapError::Quote("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            debug!(
                "Swapping {} units of {} (attempt {}/{}, shared accounts: {})",
                amount, input_mint, attempt, max_attempts, use_shared_accounts
            );

            match self.attempt_swap(input_mint, amount, use_shared_accounts).await {
                Ok(signature) => {
                    info!(tx = %signature, "Swap landed on attempt {}/{}", attempt, max_attempts);
                    return Ok((signature, attempt));
                }
                Err(err) => {
                    if matches!(err, SwapError::SharedAccountsUnsupported(_)) && use_shared_accounts
                    {
                        warn!("Route does not support shared accounts, retrying without them");
                        use_shared_accounts = false;
                    }
                    warn!("Retry {}/{}: {}", attempt, max_attempts, err);
                    last_error = err;
                }
            }

            if attempt < max_attempts && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(SellError::Exhausted {
            attempts: max_attempts,
            last: last_error,
        })
    }

    async fn attempt_swap(
        &self,
        input_mint: &str,
        amount: u64,
        use_shared_accounts: bool,
    ) -> Result<String, SwapError> {
        let quote = self
            .venue
            .quote(input_mint, &self.config.base_mint, amount)
            .await?;
        debug!(
            "Quote: {} in -> {} out ({})",
            quote.in_amount, quote.out_amount, self.config.base_mint
        );
        self.venue.execute(&quote, use_shared_accounts).await
    }

    async fn estimate_proceeds(&self, airdrop: &Airdrop) -> u64 {
        let usd = airdrop.usd_value().unwrap_or(0.0);
        match self.prices.price_usd().await {
            Some(price) if price > 0.0 => (usd / price * LAMPORTS_PER_SOL as f64) as u64,
            _ => {
                warn!("SOL price unavailable, recording zero proceeds");
                0
            }
        }
    }

    /// Sell, then record stats and notify either way.
    ///
    /// `claim_fee_lamports` is folded into the net profit when the sale
    /// follows a claim.
    pub async fn sell_and_report(
        &self,
        airdrop: &Airdrop,
        claim_fee_lamports: Option<u64>,
    ) -> Result<SaleReport, SellError> {
        match self.sell_token(airdrop).await {
            Ok(report) => {
                self.report_sale(airdrop, &report, claim_fee_lamports.unwrap_or(0))
                    .await;
                Ok(report)
            }
            Err(err) => {
                error!(airdrop = %airdrop.id, "Failed to sell {}: {}", airdrop.token.symbol, err);
                self.notifier
                    .notify(Notification::SaleFailed {
                        token_name: airdrop.token.name.clone(),
                        token_symbol: airdrop.token.symbol.clone(),
                        amount: airdrop.display_amount(),
                        usd_value: airdrop.usd_value().unwrap_or(0.0),
                        attempts: err.attempts(),
                        error: truncate_error(&err.to_string()),
                    })
                    .await;
                Err(err)
            }
        }
    }

    async fn report_sale(&self, airdrop: &Airdrop, report: &SaleReport, claim_fee: u64) {
        let net_lamports =
            report.proceeds_lamports as i64 - report.fee_lamports as i64 - claim_fee as i64;

        let row = TransactionStats {
            timestamp: Utc::now(),
            kind: TxKind::Swap,
            token_symbol: airdrop.token.symbol.clone(),
            token_amount: airdrop.amount_raw.clone(),
            expenses_lamports: report.fee_lamports + claim_fee,
            gross_lamports: report.proceeds_lamports,
            net_lamports,
            signature: report.signature.clone(),
            source: report.source,
        };
        if let Err(e) = self.stats.record(&row) {
            warn!("Failed to record swap stats: {}", e);
        }

        let summary = match self.stats.profit_summary() {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Failed to compute profit summary: {}", e);
                None
            }
        };

        self.notifier
            .notify(Notification::Sold {
                token_name: airdrop.token.name.clone(),
                token_symbol: airdrop.token.symbol.clone(),
                amount: airdrop.display_amount(),
                net_profit_sol: signed_lamports_to_sol(net_lamports),
                sol_price_usd: self.prices.price_usd().await,
                summary,
                source: report.source,
                signature: report.signature.clone(),
            })
            .await;
    }
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() > NOTIFY_ERROR_LIMIT {
        let head: String = message.chars().take(NOTIFY_ERROR_LIMIT).collect();
        format!("{head}...")
    } else {
        message.to_string()
    }
}
