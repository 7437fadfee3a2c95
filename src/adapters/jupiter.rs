//! Jupiter v6 swap venue

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::solana_rpc::SolanaRpc;
use super::traits::{SwapQuote, SwapVenue};
use crate::error::{classify_message, ErrorClass, RedeemerError, Result, SwapError};

pub const DEFAULT_QUOTE_URL: &str = "https://quote-api.jup.ag/v6/quote";
pub const DEFAULT_SWAP_URL: &str = "https://quote-api.jup.ag/v6/swap";
pub const DEFAULT_SLIPPAGE_BPS: u16 = 1000;
const SWAP_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 300_000;
const SHARED_ACCOUNTS_REJECTION: &str = "Simple AMMs are not supported with shared accounts";

#[derive(Debug, Clone)]
pub struct JupiterConfig {
    pub quote_url: String,
    pub swap_url: String,
    pub slippage_bps: u16,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            quote_url: DEFAULT_QUOTE_URL.to_string(),
            swap_url: DEFAULT_SWAP_URL.to_string(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

pub struct JupiterClient {
    http: Client,
    config: JupiterConfig,
    rpc: Arc<SolanaRpc>,
    keypair: Arc<Keypair>,
}

impl JupiterClient {
    pub fn new(config: JupiterConfig, rpc: Arc<SolanaRpc>, keypair: Arc<Keypair>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RedeemerError::Rpc(format!("failed to build Jupiter client: {}", e)))?;

        Ok(Self {
            http,
            config,
            rpc,
            keypair,
        })
    }

    async fn request_swap_transaction(
        &self,
        quote: &SwapQuote,
        use_shared_accounts: bool,
    ) -> std::result::Result<String, SwapError> {
        let body = json!({
            "userPublicKey": self.keypair.pubkey().to_string(),
            "quoteResponse": quote.raw,
            "wrapAndUnwrapSol": true,
            "useSharedAccounts": use_shared_accounts,
            "asLegacyTransaction": false,
            "computeUnitPriceMicroLamports": SWAP_PRIORITY_FEE_MICRO_LAMPORTS,
        });

        let resp = self
            .http
            .post(&self.config.swap_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SwapError::Network(format!("failed to call swap API: {}", e)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SwapError::Network(format!("failed to read swap response: {}", e)))?;

        if status != StatusCode::OK {
            return Err(swap_api_error(status, &text));
        }

        let parsed: SwapResponse = serde_json::from_str(&text)
            .map_err(|e| SwapError::Build(format!("failed to decode swap response: {}", e)))?;
        if parsed.swap_transaction.is_empty() {
            return Err(SwapError::Build("swap API returned empty transaction".into()));
        }
        Ok(parsed.swap_transaction)
    }

    async fn sign(&self, encoded: &str) -> std::result::Result<Vec<u8>, SwapError> {
        let bytes = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| SwapError::Build(format!("invalid transaction encoding: {}", e)))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| SwapError::Build(format!("failed to decode transaction: {}", e)))?;

        let blockhash = self.rpc.latest_blockhash().await.map_err(submit_error)?;
        let mut message = unsigned.message;
        message.set_recent_blockhash(blockhash);

        let signed = VersionedTransaction::try_new(message, &[&*self.keypair])
            .map_err(|e| SwapError::Build(format!("failed to sign transaction: {}", e)))?;
        bincode::serialize(&signed)
            .map_err(|e| SwapError::Build(format!("failed to serialize transaction: {}", e)))
    }
}

fn swap_api_error(status: StatusCode, body: &str) -> SwapError {
    let msg = format!("swap API returned status {} - {}", status.as_u16(), body);
    if body.contains(SHARED_ACCOUNTS_REJECTION) {
        SwapError::SharedAccountsUnsupported(msg)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SwapError::Auth(msg)
    } else {
        SwapError::Build(msg)
    }
}

fn submit_error(e: RedeemerError) -> SwapError {
    match e {
        RedeemerError::Http(e) => SwapError::Network(e.to_string()),
        other => {
            let msg = other.to_string();
            match classify_message(&msg) {
                ErrorClass::Network => SwapError::Network(msg),
                ErrorClass::Auth => SwapError::Auth(msg),
                _ => SwapError::Submit(msg),
            }
        }
    }
}

/// Read a quote body into a `SwapQuote`; zero-output quotes are rejected
fn parse_quote(
    input_mint: &str,
    output_mint: &str,
    raw: Value,
) -> std::result::Result<SwapQuote, SwapError> {
    let amount = |key: &str| -> u64 {
        raw.get(key)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };
    let in_amount = amount("inAmount");
    let out_amount = amount("outAmount");
    if out_amount == 0 {
        return Err(SwapError::Quote(format!(
            "quote with 0 output amount for {} -> {}",
            input_mint, output_mint
        )));
    }

    Ok(SwapQuote {
        input_mint: input_mint.to_string(),
        output_mint: output_mint.to_string(),
        in_amount,
        out_amount,
        raw,
    })
}

#[async_trait]
impl SwapVenue for JupiterClient {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
    ) -> std::result::Result<SwapQuote, SwapError> {
        let resp = self
            .http
            .get(&self.config.quote_url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", self.config.slippage_bps.to_string()),
                ("onlyDirectRoutes", "false".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SwapError::Network(format!("failed to call quote API: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SwapError::Network(format!("failed to read quote response: {}", e)))?;
        if status != StatusCode::OK {
            return Err(SwapError::Quote(format!(
                "quote API returned status {} - {}",
                status.as_u16(),
                text
            )));
        }

        let raw: Value = serde_json::from_str(&text)
            .map_err(|e| SwapError::Quote(format!("failed to decode quote: {}", e)))?;
        let quote = parse_quote(input_mint, output_mint, raw)?;
        debug!(
            "Quote {} -> {}: {} in, {} out",
            input_mint, output_mint, quote.in_amount, quote.out_amount
        );
        Ok(quote)
    }

    async fn execute(
        &self,
        quote: &SwapQuote,
        use_shared_accounts: bool,
    ) -> std::result::Result<String, SwapError> {
        let encoded = self
            .request_swap_transaction(quote, use_shared_accounts)
            .await?;
        let wire = self.sign(&encoded).await?;
        let signature = self.rpc.send_transaction(&wire).await.map_err(submit_error)?;
        info!(%signature, "Swap transaction submitted");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_reads_amounts() {
        let raw = json!({ "inAmount": "1000", "outAmount": "250", "routePlan": [] });
        let quote = parse_quote("MintA", "MintB", raw.clone()).unwrap();
        assert_eq!(quote.in_amount, 1000);
        assert_eq!(quote.out_amount, 250);
        assert_eq!(quote.raw, raw);
    }

    #[test]
    fn test_parse_quote_rejects_zero_output() {
        let raw = json!({ "inAmount": "1000", "outAmount": "0" });
        assert!(matches!(
            parse_quote("MintA", "MintB", raw),
            Err(SwapError::Quote(_))
        ));
    }

    #[test]
    fn test_shared_accounts_rejection_detected() {
        let body = r#"{"error":"Simple AMMs are not supported with shared accounts"}"#;
        assert!(matches!(
            swap_api_error(StatusCode::BAD_REQUEST, body),
            SwapError::SharedAccountsUnsupported(_)
        ));
        assert!(matches!(
            swap_api_error(StatusCode::BAD_REQUEST, "other"),
            SwapError::Build(_)
        ));
        assert!(matches!(
            swap_api_error(StatusCode::UNAUTHORIZED, ""),
            SwapError::Auth(_)
        ));
    }

    #[test]
    fn test_submit_errors_are_classified() {
        assert!(matches!(
            submit_error(RedeemerError::Rpc("i/o timeout".into())),
            SwapError::Network(_)
        ));
        assert!(matches!(
            submit_error(RedeemerError::Rpc("Blockhash not found".into())),
            SwapError::Submit(_)
        ));
    }
}
