//! Write attempt policies
//!
//! The writer asks its policy before every write call and reports the
//! outcome afterwards. A refused call is reported to the caller as success
//! with nothing sent.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rws_bridge_domain::constants::ATTEMPT_CEILING;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};

/// Decides whether a write call may go out
pub trait AttemptPolicy: Send + Sync {
    /// Consulted once per write call. Returning false skips the call.
    fn should_attempt(&self) -> bool;

    /// Outcome of a call that was attempted.
    fn record_outcome(&self, success: bool);

    /// Forget all history (writer connect).
    fn reset(&self);
}

/// Counts calls and skips every call past the threshold
///
/// Each call increments the counter. The call that takes the counter past
/// the threshold is skipped and the counter returns to zero, so with the
/// default threshold of 4 the fifth of five consecutive calls is a no-op.
/// Outcomes are not considered.
#[derive(Debug)]
pub struct AttemptCeiling {
    threshold: u32,
    attempts: AtomicU32,
}

impl AttemptCeiling {
    pub fn new(threshold: u32) -> Self {
        Self { threshold, attempts: AtomicU32::new(0) }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for AttemptCeiling {
    fn default() -> Self {
        Self::new(ATTEMPT_CEILING)
    }
}

impl AttemptPolicy for AttemptCeiling {
    fn should_attempt(&self) -> bool {
        let attempts = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempts > self.threshold {
            warn!(attempts, threshold = self.threshold, "Attempts exceeded, skipping write");
            self.attempts.store(0, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn record_outcome(&self, _success: bool) {}

    fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct BackoffState {
    failures: u32,
    retry_at: Option<Instant>,
}

/// Skips calls during a backoff window opened by consecutive failures
///
/// After `n` consecutive failures calls are refused for
/// `base * 2^(n-1)`, capped at `max`. A success closes the window.
#[derive(Debug)]
pub struct ExponentialBackoff<C: Clock = SystemClock> {
    base: Duration,
    max: Duration,
    clock: C,
    state: Mutex<BackoffState>,
}

impl ExponentialBackoff<SystemClock> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self::with_clock(base, max, SystemClock)
    }
}

impl<C: Clock> ExponentialBackoff<C> {
    pub fn with_clock(base: Duration, max: Duration, clock: C) -> Self {
        Self { base, max, clock, state: Mutex::new(BackoffState::default()) }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().failures
    }

    fn window(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }
}

impl<C: Clock> AttemptPolicy for ExponentialBackoff<C> {
    fn should_attempt(&self) -> bool {
        let state = self.state.lock();
        match state.retry_at {
            Some(retry_at) if self.clock.now() < retry_at => {
                debug!(failures = state.failures, "Inside backoff window, skipping write");
                false
            }
            _ => true,
        }
    }

    fn record_outcome(&self, success: bool) {
        let mut state = self.state.lock();
        if success {
            *state = BackoffState::default();
            return;
        }
        state.failures = state.failures.saturating_add(1);
        let window = self.window(state.failures);
        state.retry_at = Some(self.clock.now() + window);
        debug!(failures = state.failures, window_ms = window.as_millis() as u64, "Backoff window opened");
    }

    fn reset(&self) {
        *self.state.lock() = BackoffState::default();
    }
}
