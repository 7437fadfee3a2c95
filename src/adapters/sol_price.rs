//! SOL/USD spot price from CoinGecko

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::traits::BasePriceSource;
use crate::coordination::ShutdownSignal;
use crate::error::{RedeemerError, Result};

pub const DEFAULT_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd";

#[derive(Debug, Deserialize)]
struct PriceResponse {
    solana: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

fn parse_price(body: &str) -> Result<f64> {
    let resp: PriceResponse = serde_json::from_str(body)?;
    if resp.solana.usd.is_finite() && resp.solana.usd > 0.0 {
        Ok(resp.solana.usd)
    } else {
        Err(RedeemerError::Rpc(format!("invalid SOL price {}", resp.solana.usd)))
    }
}

pub struct SolPriceService {
    http: Client,
    url: String,
    refresh_interval: Duration,
    stale_after: Duration,
    cached: RwLock<Option<(f64, Instant)>>,
}

impl SolPriceService {
    pub fn new(url: &str, refresh_interval: Duration, stale_after: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RedeemerError::Rpc(format!("failed to build price client: {}", e)))?;

        Ok(Self {
            http,
            url: url.to_string(),
            refresh_interval,
            stale_after,
            cached: RwLock::new(None),
        })
    }

    /// Fetch and cache the current price
    pub async fn refresh(&self) -> Result<f64> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RedeemerError::Rpc(format!(
                "SOL price request failed: HTTP {}",
                status.as_u16()
            )));
        }
        let price = parse_price(&resp.text().await?)?;

        *self.cached.write().await = Some((price, Instant::now()));
        info!("Updated SOL price: ${:.2}", price);
        Ok(price)
    }

    async fn fresh_cached(&self) -> Option<f64> {
        let cached = *self.cached.read().await;
        cached
            .filter(|(_, at)| at.elapsed() <= self.stale_after)
            .map(|(price, _)| price)
    }

    /// Refresh periodically until shutdown
    pub fn spawn_refresh_loop(self: Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.refresh().await {
                    warn!("Error fetching SOL price: {}", e);
                }
                if shutdown.sleep(self.refresh_interval).await {
                    debug!("SOL price refresh loop stopped");
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl BasePriceSource for SolPriceService {
    async fn price_usd(&self) -> Option<f64> {
        if let Some(price) = self.fresh_cached().await {
            return Some(price);
        }
        match self.refresh().await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!("Error fetching SOL price: {}", e);
                // Last known price, however old
                self.cached.read().await.map(|(price, _)| price)
            }
        }
    }
}
