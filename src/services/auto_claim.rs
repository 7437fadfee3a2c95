//! Auto-claim orchestration loop
//!
//! Each cycle scans every pending airdrop, refreshes its price history,
//! evaluates the claim policy and claims at most one airdrop. Claimed tokens
//! still in the wallet (claimed on the platform, or claimed here with a failed
//! sale) are sold in background tasks that never block the loop. Authorization failures trigger a throttled
//! credential refresh; a failed claim is retried once after a refresh.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapters::{CredentialRefresher, Notifier};
use crate::coordination::{GateDecision, RefreshGate, ShutdownSignal};
use crate::domain::{Airdrop, Notification};
use crate::error::{ErrorClass, FeedError, Result};
use crate::persistence::AirdropStore;
use crate::services::scanner::{Scanner, SCAN_ALL_THRESHOLD_USD};
use crate::strategy::{
    ClaimedSet, Claimer, DecisionMaker, InFlight, PriceTracker, SaleStatus, TokenSeller,
};

/// Loop timing and policy
#[derive(Debug, Clone)]
pub struct AutoClaimConfig {
    /// Shown in the startup notification
    pub wallet_address: String,
    pub minimum_usd_threshold: f64,
    pub check_interval: Duration,
    /// Extra wait after a claim attempt before the next cycle
    pub post_claim_delay: Duration,
    /// Wait after a transport-level scan failure
    pub network_backoff: Duration,
    /// Wait after any other scan failure
    pub error_backoff: Duration,
    /// Minimum spacing between successful credential refreshes
    pub auth_refresh_interval: Duration,
}

impl Default for AutoClaimConfig {
    fn default() -> Self {
        Self {
            wallet_address: String::new(),
            minimum_usd_threshold: 0.15,
            check_interval: Duration::from_secs(60),
            post_claim_delay: Duration::from_secs(60),
            network_backoff: Duration::from_secs(3),
            error_backoff: Duration::from_secs(30),
            auth_refresh_interval: Duration::from_secs(30 * 60),
        }
    }
}

/// What happened to the claim attempted in a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimAttempt {
    Claimed { id: String, signature: String },
    /// Permanent failure; the airdrop will not be retried
    Settled { id: String, reason: String },
    /// Transient failure; retried on a later cycle
    Failed { id: String, reason: String },
}

impl ClaimAttempt {
    pub fn id(&self) -> &str {
        match self {
            ClaimAttempt::Claimed { id, .. }
            | ClaimAttempt::Settled { id, .. }
            | ClaimAttempt::Failed { id, .. } => id,
        }
    }
}

/// Summary of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub scanned: usize,
    pub scan_error: Option<String>,
    /// Claim-eligible ids in feed order
    pub eligible: Vec<String>,
    pub claim: Option<ClaimAttempt>,
    /// Ids whose direct sale was started this cycle
    pub sales_started: Vec<String>,
    /// How long to wait before the next cycle
    pub next_wait: Duration,
}

/// Collaborators of the loop
pub struct AutoClaimDeps {
    pub scanner: Scanner,
    pub claimer: Arc<Claimer>,
    pub seller: Arc<TokenSeller>,
    pub notifier: Arc<dyn Notifier>,
    pub refresher: Option<Arc<dyn CredentialRefresher>>,
}

struct Inner {
    config: AutoClaimConfig,
    scanner: Scanner,
    store: AirdropStore,
    claimer: Arc<Claimer>,
    seller: Arc<TokenSeller>,
    notifier: Arc<dyn Notifier>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    tracker: PriceTracker,
    decisions: DecisionMaker,
    claimed: ClaimedSet,
    selling: InFlight,
    refresh_gate: RefreshGate,
    sell_tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: ShutdownSignal,
}

/// The polling service
#[derive(Clone)]
pub struct AutoClaimService {
    inner: Arc<Inner>,
}

impl AutoClaimService {
    pub fn new(config: AutoClaimConfig, deps: AutoClaimDeps, shutdown: ShutdownSignal) -> Self {
        let decisions = DecisionMaker::new(config.minimum_usd_threshold);
        Self::with_decisions(config, deps, decisions, shutdown)
    }

    pub fn with_decisions(
        config: AutoClaimConfig,
        deps: AutoClaimDeps,
        decisions: DecisionMaker,
        shutdown: ShutdownSignal,
    ) -> Self {
        let store = deps.scanner.store().clone();
        Self {
            inner: Arc::new(Inner {
                refresh_gate: RefreshGate::new(config.auth_refresh_interval),
                config,
                scanner: deps.scanner,
                store,
                claimer: deps.claimer,
                seller: deps.seller,
                notifier: deps.notifier,
                refresher: deps.refresher,
                tracker: PriceTracker::new(),
                decisions,
                claimed: ClaimedSet::new(),
                selling: InFlight::new(),
                sell_tasks: Mutex::new(Vec::new()),
                shutdown,
            }),
        }
    }

    pub fn claimed(&self) -> &ClaimedSet {
        &self.inner.claimed
    }

    pub fn tracker(&self) -> &PriceTracker {
        &self.inner.tracker
    }

    /// Run until shutdown is requested, then wait for in-flight sales
    pub async fn run(&self) -> Result<()> {
        let config = &self.inner.config;
        let auto_sell = self.inner.claimer.config().auto_sell;
        info!(
            "Starting auto-claim (threshold: ${:.2}, interval: {}s, auto_sell: {})",
            config.minimum_usd_threshold,
            config.check_interval.as_secs(),
            auto_sell
        );

        self.inner
            .notifier
            .notify(Notification::Started {
                wallet: config.wallet_address.clone(),
                minimum_usd_threshold: config.minimum_usd_threshold,
                check_interval: config.check_interval,
                auto_sell,
            })
            .await;

        while !self.inner.shutdown.is_requested() {
            let report = self.run_cycle().await;
            if self.inner.shutdown.sleep(report.next_wait).await {
                break;
            }
        }

        self.drain_sales().await;
        info!("Auto-claim stopped");
        Ok(())
    }

    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle evaluated at `now`
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        let inner = &self.inner;
        let mut report = CycleReport {
            next_wait: inner.config.check_interval,
            ..CycleReport::default()
        };

        let airdrops = match inner.scanner.scan(SCAN_ALL_THRESHOLD_USD).await {
            Ok(airdrops) => airdrops,
            Err(e) => {
                report.next_wait = inner.handle_scan_error(&e).await;
                report.scan_error = Some(e.to_string());
                return report;
            }
        };
        report.scanned = airdrops.len();

        let mut eligible: Vec<Airdrop> = Vec::new();
        for airdrop in airdrops {
            if inner.claimed.contains(&airdrop.id) {
                debug!(airdrop = %airdrop.id, "already handled");
                continue;
            }

            inner
                .tracker
                .record_observation_at(&airdrop.id, &airdrop.amount_usd, now);
            let observation = inner.tracker.observation(&airdrop.id);

            // Claimed by us but the follow-up sale has not landed yet
            let claimed_locally = inner.store.is_claimed(&airdrop.id);

            if airdrop.claimed_at.is_none()
                && !claimed_locally
                && inner
                    .decisions
                    .should_claim(&airdrop, observation.as_ref(), now)
            {
                eligible.push(airdrop);
            } else if (claimed_locally
                && inner
                    .decisions
                    .sale_ready(&airdrop, observation.as_ref(), now))
                || inner
                    .decisions
                    .should_sell_directly(&airdrop, observation.as_ref(), now)
            {
                let id = airdrop.id.clone();
                if self.spawn_direct_sale(airdrop) {
                    report.sales_started.push(id);
                }
            }
        }
        report.eligible = eligible.iter().map(|a| a.id.clone()).collect();

        if let Some(target) = eligible.into_iter().next() {
            if report.eligible.len() > 1 {
                info!(
                    "{} airdrops eligible, claiming {} this cycle",
                    report.eligible.len(),
                    target.id
                );
            }
            report.claim = Some(inner.claim_one(&target).await);
            report.next_wait = inner.config.post_claim_delay + inner.config.check_interval;
        }

        report
    }

    /// Start a background sale unless one is already running for this id
    fn spawn_direct_sale(&self, airdrop: Airdrop) -> bool {
        let inner = &self.inner;
        if inner.claimed.contains(&airdrop.id) || !inner.selling.try_acquire(&airdrop.id) {
            return false;
        }

        info!(
            airdrop = %airdrop.id,
            "{} already claimed with a stable price, selling directly",
            airdrop.token.symbol
        );

        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            task_inner.sell_directly(&airdrop).await;
            task_inner.selling.release(&airdrop.id);
        });

        let mut tasks = inner.sell_tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
        true
    }

    /// Wait for every background sale started so far
    pub async fn drain_sales(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self
                .inner
                .sell_tasks
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        if !handles.is_empty() {
            info!("Waiting for {} in-flight sale(s)", handles.len());
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Sale task failed: {}", e);
            }
        }
    }
}

impl Inner {
    async fn handle_scan_error(&self, err: &FeedError) -> Duration {
        match err.class() {
            ErrorClass::Auth => {
                warn!("Scan rejected credentials: {}", err);
                self.refresh_credentials().await;
                self.config.error_backoff
            }
            ErrorClass::Network => {
                warn!(
                    "Network error while scanning, retrying in {}s: {}",
                    self.config.network_backoff.as_secs(),
                    err
                );
                self.config.network_backoff
            }
            _ => {
                error!(
                    "Scan failed, retrying in {}s: {}",
                    self.config.error_backoff.as_secs(),
                    err
                );
                self.config.error_backoff
            }
        }
    }

    async fn claim_one(&self, airdrop: &Airdrop) -> ClaimAttempt {
        let id = airdrop.id.clone();
        let mut result = self.claimer.claim_by_id(&id).await;

        if let Err(e) = &result {
            if e.class() == ErrorClass::Auth && self.refresh_credentials().await {
                info!(airdrop = %id, "Retrying claim with refreshed credentials");
                result = self.claimer.claim_by_id(&id).await;
            }
        }

        match result {
            Ok(receipt) => {
                info!(airdrop = %id, tx = %receipt.signature, "Claimed {}", airdrop.token.symbol);
                if let SaleStatus::Failed(reason) = &receipt.sale {
                    // Never claim again, but let the direct-sale path retry the sale
                    self.store.mark_claimed(&id);
                    warn!(airdrop = %id, "Sale after claim failed, will retry: {}", reason);
                } else {
                    self.settle(&id);
                }
                ClaimAttempt::Claimed {
                    id,
                    signature: receipt.signature,
                }
            }
            Err(e) if e.is_permanent() => {
                self.settle(&id);
                warn!(airdrop = %id, "Claim will not be retried: {}", e);
                ClaimAttempt::Settled {
                    id,
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                error!(airdrop = %id, "Failed to claim {}: {}", airdrop.token.symbol, e);
                ClaimAttempt::Failed {
                    id,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn sell_directly(&self, airdrop: &Airdrop) {
        match self.seller.sell_and_report(airdrop, None).await {
            Ok(report) => {
                self.settle(&airdrop.id);
                info!(airdrop = %airdrop.id, tx = %report.signature, "Direct sale complete");
            }
            Err(e) => match e.class() {
                ErrorClass::Permanent => {
                    self.settle(&airdrop.id);
                    warn!(airdrop = %airdrop.id, "Direct sale will not be retried: {}", e);
                }
                ErrorClass::Auth => {
                    warn!(airdrop = %airdrop.id, "Direct sale rejected credentials: {}", e);
                    self.refresh_credentials().await;
                }
                _ => warn!(airdrop = %airdrop.id, "Direct sale failed, will retry: {}", e),
            },
        }
    }

    fn settle(&self, id: &str) {
        self.claimed.insert(id);
        self.store.mark_claimed(id);
    }

    /// Returns true when credentials were actually refreshed
    async fn refresh_credentials(&self) -> bool {
        let Some(refresher) = &self.refresher else {
            warn!("Authorization failed and no credential refresher is configured");
            return false;
        };

        match self.refresh_gate.try_begin() {
            GateDecision::Proceed => {}
            GateDecision::Throttled(elapsed) => {
                info!(
                    "Credentials refreshed {}s ago, not refreshing again yet",
                    elapsed.as_secs()
                );
                return false;
            }
            GateDecision::Busy => {
                debug!("Credential refresh already in progress");
                return false;
            }
        }

        info!("Refreshing platform credentials");
        match refresher.refresh().await {
            Ok(()) => {
                self.refresh_gate.finish(true);
                info!("Credentials refreshed");
                true
            }
            Err(e) => {
                self.refresh_gate.finish(false);
                error!("Credential refresh failed: {}", e);
                false
            }
        }
    }
}
