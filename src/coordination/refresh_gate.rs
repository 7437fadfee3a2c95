//! Throttle for credential refreshes
//!
//! At most one refresh runs at a time, and after a successful refresh no
//! other is started until `min_interval` has passed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    last_success: Option<Instant>,
    in_progress: bool,
}

#[derive(Debug)]
pub struct RefreshGate {
    min_interval: Duration,
    state: Mutex<GateState>,
}

/// Outcome of asking the gate for permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// Refreshed recently; carries the time since that refresh
    Throttled(Duration),
    /// Another task is refreshing right now
    Busy,
}

impl RefreshGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Ask to start a refresh. On `Proceed` the caller must call [`RefreshGate::finish`].
    pub fn try_begin(&self) -> GateDecision {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.in_progress {
            return GateDecision::Busy;
        }
        if let Some(last) = state.last_success {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                return GateDecision::Throttled(elapsed);
            }
        }
        state.in_progress = true;
        GateDecision::Proceed
    }

    pub fn finish(&self, success: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_progress = false;
        if success {
            state.last_success = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_throttles_next_refresh() {
        let gate = RefreshGate::new(Duration::from_secs(1800));
        assert_eq!(gate.try_begin(), GateDecision::Proceed);
        assert_eq!(gate.try_begin(), GateDecision::Busy);
        gate.finish(true);
        assert!(matches!(gate.try_begin(), GateDecision::Throttled(_)));
    }

    #[test]
    fn test_failure_does_not_throttle() {
        let gate = RefreshGate::new(Duration::from_secs(1800));
        assert_eq!(gate.try_begin(), GateDecision::Proceed);
        gate.finish(false);
        assert_eq!(gate.try_begin(), GateDecision::Proceed);
    }

    #[test]
    fn test_zero_interval_never_throttles() {
        let gate = RefreshGate::new(Duration::ZERO);
        assert_eq!(gate.try_begin(), GateDecision::Proceed);
        gate.finish(true);
        assert_eq!(gate.try_begin(), GateDecision::Proceed);
    }
}
