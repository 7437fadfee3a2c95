//! Coordination primitives shared by the long-running services
//!
//! - Cooperative shutdown with interruptible sleeps
//! - Throttled credential refresh

pub mod refresh_gate;
pub mod shutdown;

pub use refresh_gate::{GateDecision, RefreshGate};
pub use shutdown::{install_signal_handlers, ShutdownSignal};
