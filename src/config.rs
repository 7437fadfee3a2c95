use config::{Config, ConfigError, Environment, File, Value};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::adapters::jupiter::JupiterConfig;
use crate::adapters::session::{PrivyCredentials, SessionConfig};
use crate::services::AutoClaimConfig;
use crate::strategy::{ClaimerConfig, SellerConfig, WSOL_MINT};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub wallet: WalletConfig,
    pub boop: BoopConfig,
    pub solana: SolanaConfig,
    pub claim: ClaimSettings,
    pub swap: SwapSettings,
    pub telegram: TelegramConfig,
    pub stats: StatsConfig,
    pub price: PriceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Public address the airdrops are listed for; derived from the key when empty
    #[serde(default)]
    pub address: String,
    /// Base58 secret key; required for claiming and selling
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoopConfig {
    pub graphql_url: String,
    pub privy_api_base: String,
    /// Pre-issued `Authorization` header value
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub privy_authentication: Option<String>,
    #[serde(default)]
    pub privy_token: Option<String>,
    #[serde(default)]
    pub privy_refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolanaConfig {
    pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimSettings {
    pub minimum_usd_threshold: f64,
    pub check_interval_secs: u64,
    pub post_claim_delay_secs: u64,
    pub confirmation_delay_secs: u64,
    pub network_backoff_secs: u64,
    pub error_backoff_secs: u64,
    /// Minimum spacing between successful credential refreshes
    pub auth_refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapSettings {
    /// Sell claimed tokens for SOL
    pub auto_sell: bool,
    pub quote_url: String,
    pub swap_url: String,
    pub slippage_bps: u16,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub settle_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    pub url: String,
    pub refresh_interval_secs: u64,
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a compact duration such as `90s`, `1m`, `1m30s` or `2h`.
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        total += match c {
            'h' => value * 3600,
            'm' => value * 60,
            's' => value,
            _ => return None,
        };
    }
    if !digits.is_empty() {
        return None;
    }
    Some(Duration::from_secs(total))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Overrides from the flat environment names used by earlier deployments
/// (`WALLET_PRIVATE_KEY`, `MINIMUM_USD_THRESHOLD`, ...)
fn legacy_overrides(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, Value)> {
    const PLAIN: [(&str, &str); 11] = [
        ("WALLET_ADDRESS", "wallet.address"),
        ("WALLET_PRIVATE_KEY", "wallet.private_key"),
        ("BOOP_API_URL", "boop.graphql_url"),
        ("AUTH_TOKEN", "boop.auth_token"),
        ("PRIVY_AUTH", "boop.privy_authentication"),
        ("PRIVY_TOKEN", "boop.privy_token"),
        ("PRIVY_REFRESH_TOKEN", "boop.privy_refresh_token"),
        ("SOLANA_RPC_URL", "solana.rpc_url"),
        ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
        ("TELEGRAM_CHAT_ID", "telegram.chat_id"),
        ("STATS_DATA_DIR", "stats.data_dir"),
    ];

    let mut overrides: Vec<(&'static str, Value)> = PLAIN
        .iter()
        .filter_map(|(env, key)| {
            lookup(env)
                .filter(|v| !v.is_empty())
                .map(|v| (*key, Value::from(v)))
        })
        .collect();

    if let Some(threshold) = lookup("MINIMUM_USD_THRESHOLD").and_then(|v| v.trim().parse::<f64>().ok()) {
        overrides.push(("claim.minimum_usd_threshold", Value::from(threshold)));
    }
    if let Some(interval) = lookup("CHECK_INTERVAL").as_deref().and_then(parse_duration) {
        overrides.push((
            "claim.check_interval_secs",
            Value::from(interval.as_secs() as i64),
        ));
    }
    if let Some(enabled) = lookup("ENABLE_TELEGRAM").as_deref().and_then(parse_flag) {
        overrides.push(("telegram.enabled", Value::from(enabled)));
    }
    overrides
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("wallet.address", "")?
            .set_default("boop.graphql_url", crate::adapters::boop::DEFAULT_GRAPHQL_URL)?
            .set_default(
                "boop.privy_api_base",
                crate::adapters::session::DEFAULT_PRIVY_API_BASE,
            )?
            .set_default("solana.rpc_url", "https://api.mainnet-beta.solana.com")?
            .set_default("claim.minimum_usd_threshold", 0.15)?
            .set_default("claim.check_interval_secs", 60)?
            .set_default("claim.post_claim_delay_secs", 60)?
            .set_default("claim.confirmation_delay_secs", 5)?
            .set_default("claim.network_backoff_secs", 3)?
            .set_default("claim.error_backoff_secs", 30)?
            .set_default("claim.auth_refresh_interval_secs", 1800)?
            .set_default("swap.auto_sell", true)?
            .set_default("swap.quote_url", crate::adapters::jupiter::DEFAULT_QUOTE_URL)?
            .set_default("swap.swap_url", crate::adapters::jupiter::DEFAULT_SWAP_URL)?
            .set_default(
                "swap.slippage_bps",
                crate::adapters::jupiter::DEFAULT_SLIPPAGE_BPS as i64,
            )?
            .set_default("swap.max_attempts", 10)?
            .set_default("swap.retry_delay_secs", 3)?
            .set_default("swap.settle_delay_secs", 2)?
            .set_default("telegram.enabled", false)?
            .set_default("stats.data_dir", "./data/stats")?
            .set_default("price.url", crate::adapters::sol_price::DEFAULT_PRICE_URL)?
            .set_default("price.refresh_interval_secs", 600)?
            .set_default("price.stale_after_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("REDEEMER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (REDEEMER_CLAIM__CHECK_INTERVAL_SECS, etc.)
            .add_source(
                Environment::with_prefix("REDEEMER")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, value) in legacy_overrides(|name| std::env::var(name).ok()) {
            builder = builder.set_override(key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.wallet.address.is_empty() && self.wallet.private_key.is_none() {
            errors.push("wallet.address or wallet.private_key must be set".to_string());
        }

        let threshold = self.claim.minimum_usd_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            errors.push(format!(
                "minimum_usd_threshold must be a non-negative number, got {threshold}"
            ));
        }

        if self.claim.check_interval_secs == 0 {
            errors.push("check_interval_secs must be positive".to_string());
        }

        if self.swap.max_attempts == 0 {
            errors.push("swap.max_attempts must be at least 1".to_string());
        }

        if self.swap.slippage_bps > 10_000 {
            errors.push("swap.slippage_bps must not exceed 10000".to_string());
        }

        if self.telegram.enabled
            && (self.telegram.bot_token.is_empty() || self.telegram.chat_id.is_empty())
        {
            errors.push("telegram is enabled but bot_token or chat_id is missing".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn auto_claim_config(&self, wallet_address: &str) -> AutoClaimConfig {
        AutoClaimConfig {
            wallet_address: wallet_address.to_string(),
            minimum_usd_threshold: self.claim.minimum_usd_threshold,
            check_interval: Duration::from_secs(self.claim.check_interval_secs),
            post_claim_delay: Duration::from_secs(self.claim.post_claim_delay_secs),
            network_backoff: Duration::from_secs(self.claim.network_backoff_secs),
            error_backoff: Duration::from_secs(self.claim.error_backoff_secs),
            auth_refresh_interval: Duration::from_secs(self.claim.auth_refresh_interval_secs),
        }
    }

    pub fn claimer_config(&self) -> ClaimerConfig {
        ClaimerConfig {
            auto_sell: self.swap.auto_sell,
            confirmation_delay: Duration::from_secs(self.claim.confirmation_delay_secs),
        }
    }

    pub fn seller_config(&self) -> SellerConfig {
        SellerConfig {
            base_mint: WSOL_MINT.to_string(),
            max_attempts: self.swap.max_attempts,
            retry_delay: Duration::from_secs(self.swap.retry_delay_secs),
            settle_delay: Duration::from_secs(self.swap.settle_delay_secs),
        }
    }

    pub fn jupiter_config(&self) -> JupiterConfig {
        JupiterConfig {
            quote_url: self.swap.quote_url.clone(),
            swap_url: self.swap.swap_url.clone(),
            slippage_bps: self.swap.slippage_bps,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let privy = match (&self.boop.privy_authentication, &self.boop.privy_token) {
            (Some(auth), Some(token)) => Some(PrivyCredentials {
                authentication: auth.clone(),
                identity_token: token.clone(),
                refresh_token: self.boop.privy_refresh_token.clone().unwrap_or_default(),
            }),
            _ => None,
        };

        SessionConfig {
            graphql_url: self.boop.graphql_url.clone(),
            privy_api_base: self.boop.privy_api_base.clone(),
            static_auth_token: self.boop.auth_token.clone().filter(|t| !t.is_empty()),
            privy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_defaults() -> AppConfig {
        let dir = std::env::temp_dir().join(format!("redeemer-config-{}", uuid::Uuid::new_v4()));
        AppConfig::load_from(dir).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("5m3"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_legacy_overrides() {
        let env: HashMap<&str, &str> = [
            ("WALLET_ADDRESS", "Wa11et"),
            ("MINIMUM_USD_THRESHOLD", "0.25"),
            ("CHECK_INTERVAL", "2m"),
            ("ENABLE_TELEGRAM", "true"),
            ("AUTH_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        let overrides = legacy_overrides(|name| env.get(name).map(|v| v.to_string()));
        let keys: Vec<&str> = overrides.iter().map(|(k, _)| *k).collect();

        assert!(keys.contains(&"wallet.address"));
        assert!(keys.contains(&"claim.minimum_usd_threshold"));
        assert!(keys.contains(&"claim.check_interval_secs"));
        assert!(keys.contains(&"telegram.enabled"));
        assert!(!keys.contains(&"boop.auth_token"));

        let interval = overrides
            .iter()
            .find(|(k, _)| *k == "claim.check_interval_secs")
            .map(|(_, v)| v.clone().into_int().unwrap());
        assert_eq!(interval, Some(120));
    }

    #[test]
    fn test_defaults_match_policy() {
        let mut config = load_defaults();
        config.wallet.address = "Wa11et".into();

        let auto = config.auto_claim_config("Wa11et");
        assert_eq!(auto.check_interval, Duration::from_secs(60));
        assert_eq!(auto.post_claim_delay, Duration::from_secs(60));
        assert_eq!(auto.network_backoff, Duration::from_secs(3));
        assert_eq!(auto.error_backoff, Duration::from_secs(30));
        assert_eq!(auto.auth_refresh_interval, Duration::from_secs(1800));

        let seller = config.seller_config();
        assert_eq!(seller.max_attempts, 10);
        assert_eq!(seller.retry_delay, Duration::from_secs(3));
        assert_eq!(config.jupiter_config().slippage_bps, 1000);
        assert!(config.claimer_config().auto_sell);
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = load_defaults();
        config.wallet.address = String::new();
        config.wallet.private_key = None;
        config.claim.check_interval_secs = 0;
        config.telegram.enabled = true;
        config.telegram.bot_token = String::new();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_session_config_requires_both_privy_tokens() {
        let mut config = load_defaults();
        config.boop.privy_authentication = Some("Bearer a".into());
        assert!(config.session_config().privy.is_none());

        config.boop.privy_token = Some("id".into());
        let privy = config.session_config().privy.unwrap();
        assert_eq!(privy.identity_token, "id");
        assert!(privy.refresh_token.is_empty());
    }
}
