use airdrop_redeemer::adapters::{
    load_keypair, BoopClient, ClaimProgram, JupiterClient, LogNotifier, Notifier,
    SessionManager, SolPriceService, SolanaClaimSubmitter, SolanaRpc, TelegramNotifier,
};
use airdrop_redeemer::adapters::wallet::verify_address;
use airdrop_redeemer::config::{AppConfig, LoggingConfig};
use airdrop_redeemer::error::{RedeemerError, Result};
use airdrop_redeemer::persistence::{AirdropStore, CsvStatsRecorder};
use airdrop_redeemer::services::Scanner;
use airdrop_redeemer::strategy::{Claimer, TokenSeller};
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},airdrop_redeemer=debug", config.level))
    });

    let log_dir = std::env::var("REDEEMER_LOG_DIR").ok();

    // `tracing_appender::rolling::daily` panics if it can't create the
    // initial log file, so preflight writability.
    let file_layer = log_dir.as_deref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }
        let test_path = std::path::Path::new(log_dir).join(".redeemer_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(log_dir, "redeemer.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives for the whole process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let (json_layer, console_layer) = if config.json {
        (
            Some(tracing_subscriber::fmt::layer().json().with_target(true)),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/redeemer.log", dir);
    }
}

pub fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();
}

/// Load, apply CLI overrides and validate
pub fn load_config(dir: &str, min_usd: Option<f64>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from(dir)
        .map_err(|e| anyhow::anyhow!("failed to load configuration from {}: {}", dir, e))?;
    if let Some(min_usd) = min_usd {
        config.claim.minimum_usd_threshold = min_usd;
    }
    config
        .validate()
        .map_err(|errors| RedeemerError::InvalidConfig(errors.join("; ")))?;
    Ok(config)
}

/// Wallet identity: always an address, a keypair when one is configured
pub struct WalletIdentity {
    pub address: String,
    pub keypair: Option<Arc<Keypair>>,
}

impl WalletIdentity {
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let secret = config
            .wallet
            .private_key
            .as_deref()
            .filter(|k| !k.trim().is_empty());

        match secret {
            Some(secret) => {
                let keypair = load_keypair(secret)?;
                verify_address(&keypair, &config.wallet.address)?;
                Ok(Self {
                    address: keypair.pubkey().to_string(),
                    keypair: Some(Arc::new(keypair)),
                })
            }
            None if !config.wallet.address.is_empty() => Ok(Self {
                address: config.wallet.address.clone(),
                keypair: None,
            }),
            None => Err(RedeemerError::InvalidConfig(
                "wallet address or private key required".into(),
            )),
        }
    }

    pub fn signer(&self) -> Result<Arc<Keypair>> {
        self.keypair.clone().ok_or_else(|| {
            RedeemerError::InvalidConfig("wallet private key required for this command".into())
        })
    }
}

pub fn build_session(config: &AppConfig, wallet: &WalletIdentity) -> Result<Arc<SessionManager>> {
    Ok(Arc::new(SessionManager::new(
        config.session_config(),
        wallet.keypair.clone(),
    )?))
}

pub fn build_feed(
    config: &AppConfig,
    wallet: &WalletIdentity,
    session: Arc<SessionManager>,
) -> Result<Arc<BoopClient>> {
    Ok(Arc::new(BoopClient::new(
        &config.boop.graphql_url,
        &wallet.address,
        session,
    )?))
}

pub fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    if config.telegram.enabled {
        info!("Telegram notifications enabled");
        Arc::new(TelegramNotifier::new(
            config.telegram.bot_token.clone(),
            config.telegram.chat_id.clone(),
        ))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Everything the claim and sell paths need
pub struct Stack {
    pub store: AirdropStore,
    pub session: Arc<SessionManager>,
    pub scanner: Scanner,
    pub claimer: Arc<Claimer>,
    pub seller: Arc<TokenSeller>,
    pub notifier: Arc<dyn Notifier>,
    pub prices: Arc<SolPriceService>,
}

pub fn build_stack(config: &AppConfig, wallet: &WalletIdentity) -> Result<Stack> {
    let keypair = wallet.signer()?;

    let store = AirdropStore::new();
    let session = build_session(config, wallet)?;
    let feed = build_feed(config, wallet, session.clone())?;
    let rpc = Arc::new(SolanaRpc::new(&config.solana.rpc_url)?);
    let notifier = build_notifier(config);
    let stats = Arc::new(CsvStatsRecorder::new(&config.stats.data_dir)?);
    let prices = Arc::new(SolPriceService::new(
        &config.price.url,
        Duration::from_secs(config.price.refresh_interval_secs),
        Duration::from_secs(config.price.stale_after_secs),
    )?);

    let venue = Arc::new(JupiterClient::new(
        config.jupiter_config(),
        rpc.clone(),
        keypair.clone(),
    )?);
    let seller = Arc::new(TokenSeller::new(
        venue,
        rpc.clone(),
        prices.clone(),
        notifier.clone(),
        stats.clone(),
        config.seller_config(),
    ));

    let submitter = Arc::new(SolanaClaimSubmitter::new(
        rpc.clone(),
        keypair,
        ClaimProgram::default(),
    ));
    let claimer = Arc::new(Claimer::new(
        store.clone(),
        submitter,
        rpc,
        seller.clone(),
        notifier.clone(),
        stats,
        config.claimer_config(),
    ));

    Ok(Stack {
        scanner: Scanner::new(feed, store.clone()),
        store,
        session,
        claimer,
        seller,
        notifier,
        prices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_names_the_directory_on_parse_failure() {
        let dir = std::env::temp_dir().join(format!("redeemer-runtime-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.toml"), "[claim\nminimum_usd_threshold = ").unwrap();

        let dir_str = dir.to_string_lossy().to_string();
        let err = load_config(&dir_str, None).unwrap_err();
        assert!(err
            .to_string()
            .starts_with(&format!("failed to load configuration from {}", dir_str)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
