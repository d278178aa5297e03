//! Run-wide rate-limit and backoff state.
//!
//! One [`RateLimiter`] is created per run and shared (via `Arc`) by every
//! request that run makes. Concurrent callers therefore observe a single
//! pause: when one request is told to back off, the others wait too instead
//! of each computing its own delay and hammering the service.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Backoff tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub initial: Duration,

    /// Upper bound for computed delays (server hints may exceed it)
    pub max: Duration,

    /// Add up to 50% random jitter to computed delays
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay for the `failures`-th consecutive failure (1-based), before jitter.
    pub fn base_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    /// No request may be sent before this instant
    paused_until: Option<Instant>,

    /// Transient failures since the last success, across all callers
    consecutive_failures: u32,

    /// Last reported remaining quota
    remaining: Option<u64>,
}

/// Shared backoff counter for one run.
#[derive(Debug, Default)]
pub struct RateLimiter {
    policy: BackoffPolicy,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter with the given policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Wait until the shared pause, if any, has passed.
    pub async fn wait_turn(&self) {
        loop {
            let until = {
                let state = self.state.lock().await;
                match state.paused_until {
                    Some(until) if until > Instant::now() => until,
                    _ => return,
                }
            };
            let wait = until.saturating_duration_since(Instant::now());
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate-limit pause");
            tokio::time::sleep_until(until).await;
        }
    }

    /// Record a successful response and its quota headers.
    ///
    /// `reset_in` is how long until the quota resets; when the remaining quota
    /// is exhausted every caller pauses until then.
    pub async fn record_success(&self, remaining: Option<u64>, reset_in: Option<Duration>) {
        let mut state = self.state.lock().await;
        state.consecutive_failures = 0;
        if remaining.is_some() {
            state.remaining = remaining;
        }
        if let (Some(0), Some(reset_in)) = (remaining, reset_in) {
            tracing::warn!(
                reset_in_secs = reset_in.as_secs(),
                "Rate-limit quota exhausted, pausing until reset"
            );
            Self::extend_pause(&mut state, Instant::now() + reset_in);
        }
    }

    /// Record a transient failure and compute the delay before the next try.
    ///
    /// The exponent is driven by run-wide consecutive failures; a server hint
    /// (`Retry-After` or quota reset) wins when it is longer.
    pub async fn record_failure(&self, hint: Option<Duration>) -> Duration {
        let mut state = self.state.lock().await;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        let mut delay = self.policy.base_delay(state.consecutive_failures);
        if self.policy.jitter && !delay.is_zero() {
            let jitter_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
            delay += Duration::from_millis(jitter_ms);
        }
        if let Some(hint) = hint {
            delay = delay.max(hint);
        }

        Self::extend_pause(&mut state, Instant::now() + delay);
        delay
    }

    fn extend_pause(state: &mut LimiterState, until: Instant) {
        state.paused_until = Some(match state.paused_until {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    /// Consecutive transient failures seen by this run.
    pub async fn consecutive_failures(&self) -> u32 {
        self.state.lock().await.consecutive_failures
    }

    /// Last remaining quota reported by the service.
    pub async fn remaining(&self) -> Option<u64> {
        self.state.lock().await.remaining
    }
}
