pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod services;
pub mod strategy;

pub use config::AppConfig;
pub use coordination::{RefreshGate, ShutdownSignal};
pub use domain::{Airdrop, Notification, PriceObservation, TokenInfo};
pub use error::{RedeemerError, Result};
pub use persistence::{AirdropStore, CsvStatsRecorder};
pub use services::{AirdropMonitor, AutoClaimConfig, AutoClaimService, Scanner};
pub use strategy::{Claimer, DecisionMaker, PriceTracker, TokenSeller};
