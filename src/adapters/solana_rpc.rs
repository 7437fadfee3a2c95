//! Minimal Solana JSON-RPC client
//!
//! Only the calls the redeemer needs: latest blockhash (cached), raw
//! transaction submission and parsed transaction lookup.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::traits::FeeLookup;
use crate::domain::TxEconomics;
use crate::error::{RedeemerError, Result};
use crate::strategy::WSOL_MINT;

const BLOCKHASH_TTL: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ContextValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
}

pub struct SolanaRpc {
    http: Client,
    url: String,
    next_id: AtomicU64,
    blockhash: Mutex<Option<(Hash, Instant)>>,
}

impl SolanaRpc {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RedeemerError::Rpc(format!("failed to build RPC client: {}", e)))?;

        Ok(Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            blockhash: Mutex::new(None),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self.http.post(&self.url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(RedeemerError::Rpc(format!(
                "{} failed with status code: {}, response: {}",
                method,
                status.as_u16(),
                text
            )));
        }

        let parsed: RpcResponse<T> = serde_json::from_str(&text)?;
        if let Some(err) = parsed.error {
            return Err(RedeemerError::Rpc(format!(
                "{} error {}: {}",
                method, err.code, err.message
            )));
        }
        Ok(parsed.result)
    }

    /// Latest confirmed blockhash, reused for a short window
    pub async fn latest_blockhash(&self) -> Result<Hash> {
        let mut cached = self.blockhash.lock().await;
        if let Some((hash, fetched)) = *cached {
            if fetched.elapsed() < BLOCKHASH_TTL {
                return Ok(hash);
            }
        }

        let value: ContextValue<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": "confirmed" }]))
            .await?
            .ok_or_else(|| RedeemerError::Rpc("getLatestBlockhash returned no result".into()))?;
        let hash = Hash::from_str(&value.value.blockhash)
            .map_err(|e| RedeemerError::Rpc(format!("invalid blockhash: {}", e)))?;

        *cached = Some((hash, Instant::now()));
        Ok(hash)
    }

    /// Submit a serialized transaction without preflight; returns the signature
    pub async fn send_transaction(&self, wire: &[u8]) -> Result<String> {
        let encoded = BASE64_STANDARD.encode(wire);
        self.call::<String>(
            "sendTransaction",
            json!([encoded, { "encoding": "base64", "skipPreflight": true }]),
        )
        .await?
        .ok_or_else(|| RedeemerError::Rpc("sendTransaction returned no signature".into()))
    }

    /// Parsed transaction, or `None` when not (yet) available
    pub async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<Value>> {
        self.call(
            "getTransaction",
            json!([signature, {
                "encoding": "jsonParsed",
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0,
            }]),
        )
        .await
    }
}

#[async_trait]
impl FeeLookup for SolanaRpc {
    async fn fees_and_earnings(&self, signature: &str, with_earnings: bool) -> Option<TxEconomics> {
        match self.get_parsed_transaction(signature).await {
            Ok(Some(tx)) => {
                let economics = extract_fee_and_earnings(&tx, with_earnings);
                if economics.is_none() {
                    warn!(%signature, "transaction has no readable fee metadata");
                }
                economics
            }
            Ok(None) => {
                debug!(%signature, "transaction not found");
                None
            }
            Err(e) => {
                warn!(%signature, "failed to fetch transaction: {}", e);
                None
            }
        }
    }
}

fn parsed_kind(ix: &Value) -> Option<(&str, &Value)> {
    let parsed = ix.get("parsed")?;
    Some((parsed.get("type")?.as_str()?, parsed.get("info")?))
}

fn str_field<'a>(info: &'a Value, key: &str) -> Option<&'a str> {
    info.get(key)?.as_str()
}

/// Whether `destination` is a token account the signer created or closed
/// back to itself in this transaction
fn owned_by_signer(instructions: &[Value], destination: &str, signer: &str) -> bool {
    instructions.iter().any(|ix| {
        let program = ix.get("program").and_then(Value::as_str).unwrap_or_default();
        if program != "spl-associated-token-account" && program != "spl-token" {
            return false;
        }
        let Some((kind, info)) = parsed_kind(ix) else {
            return false;
        };
        let account = str_field(info, "account");
        match kind {
            "createIdempotent" | "initializeAccount3" => {
                account == Some(destination) && str_field(info, "wallet") == Some(signer)
            }
            "closeAccount" => {
                account == Some(destination) && str_field(info, "destination") == Some(signer)
            }
            _ => false,
        }
    })
}

/// Fee and wrapped-SOL proceeds credited to the fee payer, read from a
/// `jsonParsed` transaction.
///
/// Earnings are the sum of WSOL `transferChecked` inner instructions whose
/// destination is the signer, or a token account the signer created or
/// closed in the same transaction.
pub fn extract_fee_and_earnings(tx: &Value, with_earnings: bool) -> Option<TxEconomics> {
    let meta = tx.get("meta")?;
    let fee_lamports = meta.get("fee")?.as_u64()?;
    if !with_earnings {
        return Some(TxEconomics {
            fee_lamports,
            earnings_lamports: 0,
        });
    }

    let message = tx.get("transaction")?.get("message")?;
    let signer = message
        .get("accountKeys")?
        .as_array()?
        .iter()
        .find(|k| k.get("signer").and_then(Value::as_bool).unwrap_or(false))
        .and_then(|k| str_field(k, "pubkey"))
        .unwrap_or_default();
    let outer: &[Value] = message
        .get("instructions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut earnings_lamports = 0u64;
    let inner_groups = meta
        .get("innerInstructions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for group in inner_groups {
        let Some(instructions) = group.get("instructions").and_then(Value::as_array) else {
            continue;
        };
        for ix in instructions {
            if ix.get("program").and_then(Value::as_str) != Some("spl-token") {
                continue;
            }
            let Some(("transferChecked", info)) = parsed_kind(ix) else {
                continue;
            };
            if str_field(info, "mint") != Some(WSOL_MINT) {
                continue;
            }
            let Some(destination) = str_field(info, "destination") else {
                continue;
            };
            let Some(amount) = info
                .get("tokenAmount")
                .and_then(|t| str_field(t, "amount"))
                .and_then(|a| a.parse::<u64>().ok())
            else {
                continue;
            };

            if destination == signer || owned_by_signer(outer, destination, signer) {
                earnings_lamports = earnings_lamports.saturating_add(amount);
            }
        }
    }

    Some(TxEconomics {
        fee_lamports,
        earnings_lamports,
    })
}
