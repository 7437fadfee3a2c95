use airdrop_redeemer::adapters::{CredentialRefresher, StatsSink};
use airdrop_redeemer::cli::{self, Cli, Commands};
use airdrop_redeemer::coordination::{install_signal_handlers, ShutdownSignal};
use airdrop_redeemer::persistence::{AirdropStore, CsvStatsRecorder};
use airdrop_redeemer::services::{
    AirdropMonitor, AutoClaimDeps, AutoClaimService, Scanner, SCAN_ALL_THRESHOLD_USD,
};
use airdrop_redeemer::AppConfig;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod main_runtime;

use main_runtime::{
    build_feed, build_session, build_stack, init_logging, init_logging_simple, load_config,
    WalletIdentity,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Scan) => {
            init_logging_simple();
            let config = load_config(&cli.config, cli.min_usd)?;
            run_scan(&config).await?;
        }
        Some(Commands::Claim { id, no_sell }) => {
            let config = load_config(&cli.config, cli.min_usd)?;
            init_logging(&config.logging);
            run_claim(&config, id, !*no_sell).await?;
        }
        Some(Commands::Stats) => {
            init_logging_simple();
            let config = load_config(&cli.config, cli.min_usd)?;
            let recorder = CsvStatsRecorder::new(&config.stats.data_dir)
                .with_context(|| format!("failed to open stats in {}", config.stats.data_dir))?;
            cli::print_profit_summary(&recorder.profit_summary()?);
        }
        Some(Commands::Watch) => {
            let config = load_config(&cli.config, cli.min_usd)?;
            init_logging(&config.logging);
            run_watch(&config).await?;
        }
        Some(Commands::Run { no_sell }) => {
            let mut config = load_config(&cli.config, cli.min_usd)?;
            if *no_sell {
                config.swap.auto_sell = false;
            }
            init_logging(&config.logging);
            run_service(&config).await?;
        }
        None => {
            let config = load_config(&cli.config, cli.min_usd)?;
            init_logging(&config.logging);
            run_service(&config).await?;
        }
    }

    Ok(())
}

/// Initial login so the first scan is authorized
async fn warm_up_session(session: &dyn CredentialRefresher, can_refresh: bool) {
    if !can_refresh {
        return;
    }
    if let Err(e) = session.refresh().await {
        warn!("Initial authentication failed: {}", e);
    }
}

async fn run_scan(config: &AppConfig) -> Result<()> {
    let wallet = WalletIdentity::resolve(config)?;
    let session = build_session(config, &wallet)?;
    warm_up_session(session.as_ref(), session.can_refresh().await).await;

    let feed = build_feed(config, &wallet, session)?;
    let scanner = Scanner::new(feed, AirdropStore::new());
    let airdrops = scanner
        .scan(config.claim.minimum_usd_threshold)
        .await
        .context("failed to fetch pending airdrops")?;

    println!(
        "Pending airdrops for {} worth at least ${:.2}:\n",
        wallet.address, config.claim.minimum_usd_threshold
    );
    cli::print_airdrops(&airdrops);
    Ok(())
}

async fn run_claim(config: &AppConfig, id: &str, auto_sell: bool) -> Result<()> {
    let wallet = WalletIdentity::resolve(config)?;
    let stack = build_stack(config, &wallet)?;
    warm_up_session(stack.session.as_ref(), stack.session.can_refresh().await).await;

    // Populate the store so the claimer can find the airdrop
    stack
        .scanner
        .scan(SCAN_ALL_THRESHOLD_USD)
        .await
        .context("failed to fetch pending airdrops")?;
    if !stack.store.exists(id) {
        warn!("Airdrop {} is not among the pending airdrops", id);
    }

    let receipt = stack
        .claimer
        .claim_by_id_with(id, auto_sell)
        .await
        .with_context(|| format!("failed to claim airdrop {}", id))?;
    cli::print_receipt(&receipt);
    Ok(())
}

async fn run_watch(config: &AppConfig) -> Result<()> {
    let wallet = WalletIdentity::resolve(config)?;
    let session = build_session(config, &wallet)?;
    warm_up_session(session.as_ref(), session.can_refresh().await).await;

    let shutdown = ShutdownSignal::new();
    install_signal_handlers(shutdown.clone());

    let feed = build_feed(config, &wallet, session)?;
    let monitor = AirdropMonitor::new(
        feed,
        AirdropStore::new(),
        Duration::from_secs(config.claim.check_interval_secs),
        shutdown,
    );
    monitor.run().await;
    Ok(())
}

async fn run_service(config: &AppConfig) -> Result<()> {
    let wallet = WalletIdentity::resolve(config)?;
    let stack = build_stack(config, &wallet)?;
    info!("Wallet: {}", wallet.address);

    let shutdown = ShutdownSignal::new();
    install_signal_handlers(shutdown.clone());

    let can_refresh = stack.session.can_refresh().await;
    warm_up_session(stack.session.as_ref(), can_refresh).await;
    let price_task = stack.prices.clone().spawn_refresh_loop(shutdown.clone());

    let refresher: Option<Arc<dyn CredentialRefresher>> = if can_refresh {
        Some(stack.session.clone() as Arc<dyn CredentialRefresher>)
    } else {
        warn!("No Privy credentials or wallet key for re-authentication");
        None
    };

    let service = AutoClaimService::new(
        config.auto_claim_config(&wallet.address),
        AutoClaimDeps {
            scanner: stack.scanner,
            claimer: stack.claimer,
            seller: stack.seller,
            notifier: stack.notifier,
            refresher,
        },
        shutdown.clone(),
    );

    let result = service.run().await;
    shutdown.request();
    if let Err(e) = price_task.await {
        error!("Price refresh task failed: {}", e);
    }
    Ok(result?)
}
