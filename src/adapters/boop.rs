//! Boop GraphQL airdrop feed

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::session::SessionManager;
use super::traits::AirdropFeed;
use crate::domain::{Airdrop, TokenInfo};
use crate::error::{FeedError, RedeemerError, Result};

pub const DEFAULT_GRAPHQL_URL: &str = "https://graphql-mainnet.boop.works/graphql";

const DISTRIBUTIONS_QUERY: &str = r#"
query GetAccountDistributions($address: String!, $orderBy: StakingAirdropClaimSort, $status: StakingAirdropClaimStatus) {
  account(address: $address) {
    stakingAirdrops(orderBy: $orderBy, status: $status) {
      nodes {
        ...AccountAirdrop
      }
    }
  }
}

fragment AccountAirdrop on AccountStakingAirdrop {
  id
  amountLpt
  amountUsd
  amountSolLpt
  proofs
  claimedAt
  txHash
  token {
    name
    address
    symbol
    logoUrl
    imageFlag
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    account: Option<AccountData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountData {
    staking_airdrops: StakingAirdrops,
}

#[derive(Debug, Deserialize)]
struct StakingAirdrops {
    #[serde(default)]
    nodes: Vec<AirdropNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirdropNode {
    id: String,
    #[serde(deserialize_with = "string_or_number")]
    amount_lpt: String,
    #[serde(deserialize_with = "string_or_number")]
    amount_usd: String,
    #[serde(default)]
    proofs: Vec<Vec<Value>>,
    claimed_at: Option<String>,
    tx_hash: Option<String>,
    token: TokenNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenNode {
    name: String,
    address: String,
    symbol: String,
    logo_url: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

impl AirdropNode {
    fn into_airdrop(self) -> std::result::Result<Airdrop, String> {
        let proof = self
            .proofs
            .iter()
            .map(|p| proof_node(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let claimed_at = self.claimed_at.filter(|s| !s.is_empty()).map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| {
                    warn!(airdrop = %self.id, "unparseable claimedAt {:?}", s);
                    DateTime::<Utc>::default()
                })
        });

        Ok(Airdrop {
            id: self.id,
            token: TokenInfo {
                name: self.token.name,
                address: self.token.address,
                symbol: self.token.symbol,
                logo_url: self.token.logo_url.filter(|u| !u.is_empty()),
            },
            amount_raw: self.amount_lpt,
            amount_usd: self.amount_usd,
            proof,
            claimed_at,
            tx_hash: self.tx_hash.filter(|h| !h.is_empty()),
        })
    }
}

/// Convert one wire proof (array of byte values) into a 32-byte node.
/// Longer arrays are truncated; shorter ones are zero-padded.
fn proof_node(values: &[Value]) -> std::result::Result<[u8; 32], String> {
    let mut node = [0u8; 32];
    for (slot, value) in node.iter_mut().zip(values.iter()) {
        *slot = value
            .as_u64()
            .filter(|v| *v <= u8::MAX as u64)
            .ok_or_else(|| format!("invalid proof byte {}", value))? as u8;
    }
    Ok(node)
}

fn has_auth_error(errors: &[GraphQlError]) -> bool {
    errors.iter().any(|e| {
        let msg = e.message.to_ascii_lowercase();
        msg.contains("not authorized") || msg.contains("unauthorized")
    })
}

/// Decode a feed response body. Nodes with malformed proofs are skipped.
fn parse_response(status: StatusCode, body: &str) -> std::result::Result<Vec<Airdrop>, FeedError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FeedError::Auth(format!(
            "unexpected status code: {}, response: {}",
            status.as_u16(),
            body
        )));
    }
    if status != StatusCode::OK {
        return Err(FeedError::Protocol(format!(
            "unexpected status code: {}, response: {}",
            status.as_u16(),
            body
        )));
    }

    let resp: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| FeedError::Protocol(format!("error decoding response: {}", e)))?;

    if has_auth_error(&resp.errors) {
        return Err(FeedError::Auth(format!("GraphQL authorization error: {}", body)));
    }

    let Some(account) = resp.data.and_then(|d| d.account) else {
        if let Some(first) = resp.errors.first() {
            return Err(FeedError::Protocol(format!("GraphQL error: {}", first.message)));
        }
        return Ok(Vec::new());
    };

    let mut airdrops = Vec::with_capacity(account.staking_airdrops.nodes.len());
    for node in account.staking_airdrops.nodes {
        let id = node.id.clone();
        match node.into_airdrop() {
            Ok(airdrop) => airdrops.push(airdrop),
            Err(e) => warn!(airdrop = %id, "skipping airdrop with malformed proof: {}", e),
        }
    }
    Ok(airdrops)
}

pub struct BoopClient {
    http: Client,
    graphql_url: String,
    wallet_address: String,
    session: Arc<SessionManager>,
}

impl BoopClient {
    pub fn new(
        graphql_url: &str,
        wallet_address: &str,
        session: Arc<SessionManager>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RedeemerError::Rpc(format!("failed to build feed HTTP client: {}", e)))?;

        Ok(Self {
            http,
            graphql_url: graphql_url.to_string(),
            wallet_address: wallet_address.to_string(),
            session,
        })
    }
}

#[async_trait]
impl AirdropFeed for BoopClient {
    async fn fetch_pending(&self) -> std::result::Result<Vec<Airdrop>, FeedError> {
        let body = json!({
            "query": DISTRIBUTIONS_QUERY,
            "variables": {
                "address": self.wallet_address,
                "orderBy": "AMOUNT_DESC",
                "status": "PENDING",
            },
            "operationName": "GetAccountDistributions",
        });

        let mut request = self
            .http
            .post(&self.graphql_url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(auth) = self.session.authorization_header().await {
            request = request.header(AUTHORIZATION, auth);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FeedError::Network(format!("error executing request: {}", e)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FeedError::Network(format!("error reading response body: {}", e)))?;

        let airdrops = parse_response(status, &text)?;
        debug!("Feed returned {} pending airdrops", airdrops.len());
        Ok(airdrops)
    }
}
