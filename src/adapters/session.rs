//! Platform session management
//!
//! Holds the Privy credentials and the GraphQL bearer token used by the
//! airdrop feed. `refresh()` re-acquires the bearer token:
//!
//! 1. `LoginWithPrivy` mutation with the current Privy tokens
//! 2. on failure, rotate the Privy tokens through the sessions endpoint and
//!    retry the login once
//!
//! When only a wallet keypair is configured, the Privy tokens are first
//! obtained through Sign-In-With-Solana.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::traits::CredentialRefresher;
use crate::error::{RedeemerError, Result};

pub const DEFAULT_PRIVY_API_BASE: &str = "https://auth.privy.io/api/v1";
const SITE_ORIGIN: &str = "https://boop.fun";
const PRIVY_APP_ID: &str = "cm9qu1hed02wwl50m7cd5396n";
const PRIVY_CA_ID: &str = "eea5a712-be5e-4965-aceb-9e9a77db3492";
const PRIVY_CLIENT: &str = "react-auth:2.13.0-beta-20250501014923";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const LOGIN_MUTATION: &str = r#"
mutation LoginWithPrivy {
  loginWithPrivy {
    token
  }
}"#;

/// Privy tokens as sent on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivyCredentials {
    /// Full `privy-authentication` header value (`Bearer ...`)
    pub authentication: String,
    /// `privy-token` header value (identity token)
    pub identity_token: String,
    pub refresh_token: String,
}

impl PrivyCredentials {
    pub fn is_complete(&self) -> bool {
        !self.authentication.is_empty() && !self.identity_token.is_empty()
    }

    /// Merge a Privy auth/session response; empty fields keep old values
    fn absorb(&mut self, resp: &PrivyAuthResponse) {
        if !resp.token.is_empty() {
            self.authentication = format!("Bearer {}", resp.token);
        }
        if !resp.identity_token.is_empty() {
            self.identity_token = resp.identity_token.clone();
        }
        if !resp.refresh_token.is_empty() {
            self.refresh_token = resp.refresh_token.clone();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub graphql_url: String,
    pub privy_api_base: String,
    /// Pre-issued `Authorization` header value, used until a refresh succeeds
    pub static_auth_token: Option<String>,
    pub privy: Option<PrivyCredentials>,
}

#[derive(Debug, Default)]
struct SessionState {
    privy: Option<PrivyCredentials>,
    graphql_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SiwsInitResponse {
    nonce: String,
}

#[derive(Debug, Default, Deserialize)]
struct PrivyAuthResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    identity_token: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    login_with_privy: Option<LoginToken>,
}

#[derive(Debug, Deserialize)]
struct LoginToken {
    token: String,
}

pub struct SessionManager {
    http: Client,
    config: SessionConfig,
    keypair: Option<Arc<Keypair>>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, keypair: Option<Arc<Keypair>>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RedeemerError::Auth(format!("failed to build HTTP client: {}", e)))?;

        let state = SessionState {
            privy: config.privy.clone().filter(PrivyCredentials::is_complete),
            graphql_token: None,
        };

        Ok(Self {
            http,
            config,
            keypair,
            state: RwLock::new(state),
        })
    }

    /// True when a refresh has something to work with
    pub async fn can_refresh(&self) -> bool {
        self.keypair.is_some() || self.state.read().await.privy.is_some()
    }

    /// Value for the feed's `Authorization` header
    pub async fn authorization_header(&self) -> Option<String> {
        let state = self.state.read().await;
        match &state.graphql_token {
            Some(token) => Some(format!("Bearer {}", token)),
            None => self.config.static_auth_token.clone(),
        }
    }

    async fn ensure_privy(&self) -> Result<PrivyCredentials> {
        if let Some(privy) = self.state.read().await.privy.clone() {
            return Ok(privy);
        }

        let keypair = self.keypair.as_ref().ok_or_else(|| {
            RedeemerError::Auth("no Privy credentials or wallet key configured".into())
        })?;
        let privy = self.sign_in_with_solana(keypair).await?;
        self.state.write().await.privy = Some(privy.clone());
        Ok(privy)
    }

    async fn sign_in_with_solana(&self, keypair: &Keypair) -> Result<PrivyCredentials> {
        let address = keypair.pubkey().to_string();
        info!("Authenticating with Privy for wallet {}", address);

        let init: SiwsInitResponse = self
            .post_privy("siws/init", json!({ "address": address }), None)
            .await?;
        debug!("Received SIWS nonce");

        let message = siws_message(&address, &init.nonce, Utc::now());
        let signature = keypair.sign_message(message.as_bytes());
        let signature_b64 = BASE64_STANDARD.encode(signature.as_ref());

        let resp: PrivyAuthResponse = self
            .post_privy(
                "siws/authenticate",
                json!({
                    "message": message,
                    "signature": signature_b64,
                    "walletClientType": "phantom",
                    "connectorType": "solana_adapter",
                    "mode": "login-or-sign-up",
                    "message_type": "plain",
                }),
                None,
            )
            .await?;

        if resp.token.is_empty() {
            return Err(RedeemerError::Auth(
                "Privy authentication returned no token".into(),
            ));
        }

        let mut creds = PrivyCredentials::default();
        creds.absorb(&resp);
        info!("Authenticated with Privy");
        Ok(creds)
    }

    async fn rotate_privy(&self, current: &PrivyCredentials) -> Result<PrivyCredentials> {
        info!("Refreshing Privy session tokens");
        if current.refresh_token.is_empty() {
            return Err(RedeemerError::Auth("no Privy refresh token available".into()));
        }

        let bearer = format!("Bearer {}", strip_bearer(&current.authentication));
        let resp: PrivyAuthResponse = self
            .post_privy(
                "sessions",
                json!({ "refresh_token": current.refresh_token }),
                Some(&bearer),
            )
            .await?;

        let mut updated = current.clone();
        updated.absorb(&resp);
        self.state.write().await.privy = Some(updated.clone());
        Ok(updated)
    }

    async fn login(&self, privy: &PrivyCredentials) -> Result<String> {
        let resp = self
            .http
            .post(&self.config.graphql_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, SITE_ORIGIN)
            .header("privy-authentication", &privy.authentication)
            .header("privy-token", &privy.identity_token)
            .json(&json!({
                "query": LOGIN_MUTATION,
                "operationName": "LoginWithPrivy",
            }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RedeemerError::Auth(format!(
                "login request failed with status {}: {}",
                status, body
            )));
        }

        let token = parse_login_token(&body)?;
        self.state.write().await.graphql_token = Some(token.clone());
        Ok(token)
    }

    async fn post_privy<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        authorization: Option<&str>,
    ) -> Result<T> {
        let url = format!("{}/{}", self.config.privy_api_base.trim_end_matches('/'), path);
        let mut request = self.http.post(&url).headers(privy_headers()).json(&body);
        if let Some(auth) = authorization {
            request = request.header("authorization", auth);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(RedeemerError::Auth(format!(
                "Privy {} failed with status {}: {}",
                path, status, text
            )));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl CredentialRefresher for SessionManager {
    async fn refresh(&self) -> Result<()> {
        info!("Refreshing GraphQL authentication token");
        let privy = self.ensure_privy().await?;

        match self.login(&privy).await {
            Ok(_) => {
                info!("Refreshed GraphQL authentication token");
                Ok(())
            }
            Err(e) => {
                warn!("GraphQL login failed: {}. Rotating Privy tokens", e);
                let rotated = self.rotate_privy(&privy).await?;
                self.login(&rotated).await.map_err(|e| {
                    RedeemerError::Auth(format!(
                        "GraphQL login failed with rotated Privy tokens: {}",
                        e
                    ))
                })?;
                info!("Refreshed GraphQL authentication token after Privy rotation");
                Ok(())
            }
        }
    }
}

fn privy_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static("https://boop.fun/"));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert("privy-app-id", HeaderValue::from_static(PRIVY_APP_ID));
    headers.insert("privy-ca-id", HeaderValue::from_static(PRIVY_CA_ID));
    headers.insert("privy-client", HeaderValue::from_static(PRIVY_CLIENT));
    headers
}

fn strip_bearer(value: &str) -> &str {
    value.strip_prefix("Bearer ").unwrap_or(value)
}

fn parse_login_token(body: &str) -> Result<String> {
    let resp: LoginResponse = serde_json::from_str(body)?;
    resp.data
        .and_then(|d| d.login_with_privy)
        .map(|l| l.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RedeemerError::Auth("received empty token in login response".into()))
}

/// Sign-In-With-Solana message accepted by the platform
pub fn siws_message(address: &str, nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "boop.fun wants you to sign in with your Solana account:\n\
         {address}\n\n\
         You are proving you own {address}.\n\n\
         URI: {SITE_ORIGIN}\n\
         Version: 1\n\
         Chain ID: mainnet\n\
         Nonce: {nonce}\n\
         Issued At: {}\n\
         Resources:\n- https://privy.io",
        issued_at.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    )
}
