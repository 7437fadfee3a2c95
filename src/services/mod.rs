//! Long-running services: the auto-claim loop, the scanner it drives and the
//! watch-only monitor

pub mod auto_claim;
pub mod monitor;
pub mod scanner;

pub use auto_claim::{
    AutoClaimConfig, AutoClaimDeps, AutoClaimService, ClaimAttempt, CycleReport,
};
pub use monitor::AirdropMonitor;
pub use scanner::{Scanner, SCAN_ALL_THRESHOLD_USD};
