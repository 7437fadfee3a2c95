//! In-memory collaborators for driving the auto-claim loop end to end
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airdrop_redeemer::adapters::{
    AirdropFeed, BasePriceSource, ClaimRequest, ClaimSubmitter, CredentialRefresher, FeeLookup,
    Notifier, StatsSink, SwapQuote, SwapVenue,
};
use airdrop_redeemer::domain::{
    Airdrop, Notification, ProfitSummary, TokenInfo, TransactionStats, TxEconomics,
};
use airdrop_redeemer::error::{ClaimError, FeedError, RedeemerError, Result, SwapError};
use airdrop_redeemer::persistence::AirdropStore;
use airdrop_redeemer::services::{AutoClaimConfig, AutoClaimDeps, AutoClaimService, Scanner};
use airdrop_redeemer::strategy::{Claimer, ClaimerConfig, SellerConfig, TokenSeller, WSOL_MINT};
use airdrop_redeemer::ShutdownSignal;

pub fn airdrop(id: &str, usd: &str) -> Airdrop {
    Airdrop {
        id: id.to_string(),
        token: TokenInfo {
            name: format!("Token {id}"),
            address: format!("Mint{id}"),
            symbol: id.to_uppercase(),
            logo_url: None,
        },
        amount_raw: "5000000000".to_string(),
        amount_usd: usd.to_string(),
        proof: vec![[7u8; 32]],
        claimed_at: None,
        tx_hash: None,
    }
}

pub fn platform_claimed(id: &str, usd: &str) -> Airdrop {
    Airdrop {
        claimed_at: Some(chrono::DateTime::<chrono::Utc>::default()),
        tx_hash: Some(format!("platform-{id}")),
        ..airdrop(id, usd)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Serves scripted responses, then repeats the listing set with `set_listing`
#[derive(Default)]
pub struct FakeFeed {
    scripted: Mutex<VecDeque<std::result::Result<Vec<Airdrop>, FeedError>>>,
    listing: Mutex<Vec<Airdrop>>,
    pub calls: AtomicUsize,
}

impl FakeFeed {
    pub fn set_listing(&self, airdrops: Vec<Airdrop>) {
        *lock(&self.listing) = airdrops;
    }

    pub fn fail_next(&self, err: FeedError) {
        lock(&self.scripted).push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AirdropFeed for FakeFeed {
    async fn fetch_pending(&self) -> std::result::Result<Vec<Airdrop>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = lock(&self.scripted).pop_front() {
            return next;
        }
        Ok(lock(&self.listing).clone())
    }
}

/// Succeeds unless a failure was scripted for the next submission
#[derive(Default)]
pub struct FakeSubmitter {
    failures: Mutex<VecDeque<ClaimError>>,
    pub submitted: Mutex<Vec<ClaimRequest>>,
}

impl FakeSubmitter {
    pub fn fail_next(&self, err: ClaimError) {
        lock(&self.failures).push_back(err);
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        lock(&self.submitted)
            .iter()
            .map(|r| r.airdrop_id.clone())
            .collect()
    }
}

#[async_trait]
impl ClaimSubmitter for FakeSubmitter {
    async fn submit_claim(&self, request: &ClaimRequest) -> std::result::Result<String, ClaimError> {
        lock(&self.submitted).push(request.clone());
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        Ok(format!("claim-sig-{}", request.airdrop_id))
    }
}

/// Quotes everything and fails executions as scripted
#[derive(Default)]
pub struct FakeVenue {
    failures: Mutex<VecDeque<SwapError>>,
    /// `use_shared_accounts` of every execution, in order
    pub executions: Mutex<Vec<(String, bool)>>,
}

impl FakeVenue {
    pub fn fail_next(&self, err: SwapError) {
        lock(&self.failures).push_back(err);
    }

    pub fn executions(&self) -> Vec<(String, bool)> {
        lock(&self.executions).clone()
    }
}

#[async_trait]
impl SwapVenue for FakeVenue {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
    ) -> std::result::Result<SwapQuote, SwapError> {
        Ok(SwapQuote {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            in_amount: amount,
            out_amount: 1_000_000,
            raw: serde_json::json!({ "inputMint": input_mint }),
        })
    }

    async fn execute(
        &self,
        quote: &SwapQuote,
        use_shared_accounts: bool,
    ) -> std::result::Result<String, SwapError> {
        lock(&self.executions).push((quote.input_mint.clone(), use_shared_accounts));
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        Ok(format!("swap-sig-{}", quote.input_mint))
    }
}

pub struct FakeFees;

#[async_trait]
impl FeeLookup for FakeFees {
    async fn fees_and_earnings(&self, _signature: &str, with_earnings: bool) -> Option<TxEconomics> {
        Some(TxEconomics {
            fee_lamports: 5_000,
            earnings_lamports: if with_earnings { 2_000_000 } else { 0 },
        })
    }
}

pub struct FakePrice;

#[async_trait]
impl BasePriceSource for FakePrice {
    async fn price_usd(&self) -> Option<f64> {
        Some(150.0)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: Notification) {
        lock(&self.events).push(event);
    }
}

#[derive(Default)]
pub struct MemoryStats {
    pub rows: Mutex<Vec<TransactionStats>>,
}

impl StatsSink for MemoryStats {
    fn record(&self, stats: &TransactionStats) -> Result<()> {
        lock(&self.rows).push(stats.clone());
        Ok(())
    }

    fn profit_summary(&self) -> Result<ProfitSummary> {
        Ok(ProfitSummary::default())
    }
}

/// Counts refreshes; fails while `fail` is set
#[derive(Default)]
pub struct FakeRefresher {
    pub calls: AtomicUsize,
    pub fail: std::sync::atomic::AtomicBool,
}

impl FakeRefresher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for FakeRefresher {
    async fn refresh(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RedeemerError::Auth("refresh rejected".into()));
        }
        Ok(())
    }
}

/// A service wired to fakes, with every delay set to zero
pub struct Harness {
    pub feed: Arc<FakeFeed>,
    pub submitter: Arc<FakeSubmitter>,
    pub venue: Arc<FakeVenue>,
    pub notifier: Arc<RecordingNotifier>,
    pub stats: Arc<MemoryStats>,
    pub refresher: Arc<FakeRefresher>,
    pub store: AirdropStore,
    pub shutdown: ShutdownSignal,
    pub service: AutoClaimService,
}

pub fn config() -> AutoClaimConfig {
    AutoClaimConfig {
        wallet_address: "Wallet111".to_string(),
        minimum_usd_threshold: 0.15,
        check_interval: Duration::from_secs(60),
        post_claim_delay: Duration::from_secs(60),
        network_backoff: Duration::from_secs(3),
        error_backoff: Duration::from_secs(30),
        auth_refresh_interval: Duration::from_secs(1800),
    }
}

pub fn harness(auto_sell: bool) -> Harness {
    harness_with(config(), auto_sell)
}

pub fn harness_with(config: AutoClaimConfig, auto_sell: bool) -> Harness {
    let feed = Arc::new(FakeFeed::default());
    let submitter = Arc::new(FakeSubmitter::default());
    let venue = Arc::new(FakeVenue::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let stats = Arc::new(MemoryStats::default());
    let refresher = Arc::new(FakeRefresher::default());
    let store = AirdropStore::new();
    let shutdown = ShutdownSignal::new();

    let seller = Arc::new(TokenSeller::new(
        venue.clone(),
        Arc::new(FakeFees),
        Arc::new(FakePrice),
        notifier.clone(),
        stats.clone(),
        SellerConfig {
            base_mint: WSOL_MINT.to_string(),
            max_attempts: 3,
            retry_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
        },
    ));
    let claimer = Arc::new(Claimer::new(
        store.clone(),
        submitter.clone(),
        Arc::new(FakeFees),
        seller.clone(),
        notifier.clone(),
        stats.clone(),
        ClaimerConfig {
            auto_sell,
            confirmation_delay: Duration::ZERO,
        },
    ));

    let service = AutoClaimService::new(
        config,
        AutoClaimDeps {
            scanner: Scanner::new(feed.clone(), store.clone()),
            claimer,
            seller,
            notifier: notifier.clone(),
            refresher: Some(refresher.clone() as Arc<dyn CredentialRefresher>),
        },
        shutdown.clone(),
    );

    Harness {
        feed,
        submitter,
        venue,
        notifier,
        stats,
        refresher,
        store,
        shutdown,
        service,
    }
}
