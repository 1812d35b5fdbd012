//! Request pacing and rate-limit backoff for the upstream search API.
//!
//! The governor owns two independent throttles:
//!
//! - **Pacing**: [`RateGovernor::throttle`] keeps consecutive dispatches at
//!   least `min_delay` apart, adding random jitter when it has to wait.
//! - **Backoff**: [`RateGovernor::on_rate_limited`] sleeps for the current
//!   retry delay and doubles it; [`RateGovernor::on_success`] resets it.
//!
//! Both throttles share one pacing gate. Clones of a governor share the same
//! state, so every caller is serialised through a single critical section and
//! the spacing guarantee holds no matter how many tasks are waiting.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use karar_core::governor::{GovernorConfig, RateGovernor};
//!
//! # async fn run() {
//! let governor = RateGovernor::new(
//!     GovernorConfig::default().with_min_delay(Duration::from_secs(3)),
//! );
//! governor.throttle().await;
//! // ... dispatch the request ...
//! governor.on_success().await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;

/// Status code the upstream uses for throttled requests.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Marker phrase the upstream sometimes returns with a 200 status instead of a 429.
const RATE_LIMIT_MARKER: &str = "TOO MANY REQUESTS";

/// Configuration for the rate governor.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Minimum spacing between two dispatched requests.
    pub min_delay: Duration,

    /// Upper clamp for a single pacing sleep (never below what `min_delay` needs).
    pub max_delay: Duration,

    /// Maximum random jitter added when a pacing sleep is needed (uniform [0, jitter]).
    pub jitter: Duration,

    /// Retry delay after the first rate-limit hit of a burst.
    pub base_retry_delay: Duration,

    /// Optional ceiling for the doubling retry delay.
    pub max_retry_delay: Option<Duration>,

    /// Consecutive rate-limit hits tolerated before giving up.
    /// `None` retries forever.
    pub max_rate_limit_retries: Option<u32>,
}

impl GovernorConfig {
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    pub fn with_max_retry_delay(mut self, cap: Option<Duration>) -> Self {
        self.max_retry_delay = cap;
        self
    }

    pub fn with_max_rate_limit_retries(mut self, retries: Option<u32>) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    /// Sleep needed before the next dispatch when only `elapsed` has passed
    /// since the previous one.
    fn pacing_delay(&self, elapsed: Duration) -> Duration {
        let remaining = self.min_delay.saturating_sub(elapsed);
        if remaining.is_zero() {
            return Duration::ZERO;
        }
        let jittered = remaining + Duration::from_millis(rand_jitter_ms(self.jitter));
        jittered.min(self.max_delay.max(remaining))
    }

    /// The retry delay following `current` in a burst of rate-limit hits.
    fn next_retry_delay(&self, current: Duration) -> Duration {
        let doubled = current.saturating_mul(2);
        match self.max_retry_delay {
            Some(cap) => doubled.min(cap.max(self.base_retry_delay)),
            None => doubled,
        }
    }
}

impl Default for GovernorConfig {
    /// 2 s spacing with up to 1 s jitter, 5 s sleep clamp, 10 s base backoff,
    /// at most 8 consecutive rate-limit retries.
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_secs(1),
            base_retry_delay: Duration::from_secs(10),
            max_retry_delay: None,
            max_rate_limit_retries: Some(8),
        }
    }
}

/// Mutable pacing state. Guarded by a single mutex because every decision
/// reads and writes the fields together.
#[derive(Debug)]
struct RateState {
    last_request: Option<Instant>,
    current_retry_delay: Duration,
    consecutive_hits: u32,
}

/// Point-in-time view of the governor state, for monitoring and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorStats {
    pub current_retry_delay: Duration,
    pub consecutive_hits: u32,
    pub since_last_request: Option<Duration>,
}

/// Outcome of one backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Consecutive rate-limit hits so far, including this one.
    pub attempt: u32,
    /// How long the caller slept.
    pub slept: Duration,
    /// Delay the next hit in this burst will sleep for.
    pub next_delay: Duration,
}

/// Shared pacing gate for all requests sent to the upstream.
#[derive(Debug, Clone)]
pub struct RateGovernor {
    config: GovernorConfig,
    state: Arc<Mutex<RateState>>,
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        let state = RateState {
            last_request: None,
            current_retry_delay: config.base_retry_delay,
            consecutive_hits: 0,
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Wait until `min_delay` has passed since the last dispatch, then record
    /// now as the last dispatch. Returns how long the caller slept.
    ///
    /// The gate stays locked while sleeping so waiting callers are released
    /// one at a time. Dropping the returned future releases the gate.
    pub async fn throttle(&self) -> Duration {
        let mut state = self.state.lock().await;

        let slept = match state.last_request {
            Some(last) => self.config.pacing_delay(last.elapsed()),
            None => Duration::ZERO,
        };
        if !slept.is_zero() {
            tracing::debug!(sleep_ms = %slept.as_millis(), "Rate limiting: pacing request");
            tokio::time::sleep(slept).await;
        }

        state.last_request = Some(Instant::now());
        slept
    }

    /// True when the response signals server-side throttling.
    pub fn is_rate_limited(status_code: u16, body: &str) -> bool {
        status_code == TOO_MANY_REQUESTS || body.to_uppercase().contains(RATE_LIMIT_MARKER)
    }

    /// Escalate after a rate-limited response: double the retry delay, then
    /// sleep for the delay that was current on entry.
    ///
    /// Fails with [`AppError::RateLimitExhausted`] without sleeping once the
    /// configured number of consecutive hits is exceeded.
    pub async fn on_rate_limited(&self) -> Result<Backoff, AppError> {
        let mut state = self.state.lock().await;
        state.consecutive_hits += 1;

        if let Some(max) = self.config.max_rate_limit_retries
            && state.consecutive_hits > max
        {
            let attempts = state.consecutive_hits;
            state.consecutive_hits = 0;
            tracing::error!(%attempts, "Giving up after repeated rate-limit responses");
            return Err(AppError::RateLimitExhausted { attempts });
        }

        // Escalate before sleeping so a dropped future still counts as a hit.
        let delay = state.current_retry_delay;
        state.current_retry_delay = self.config.next_retry_delay(delay);
        let backoff = Backoff {
            attempt: state.consecutive_hits,
            slept: delay,
            next_delay: state.current_retry_delay,
        };
        tracing::warn!(
            delay_secs = delay.as_secs_f64(),
            hit = backoff.attempt,
            "Rate limit hit, backing off"
        );
        tokio::time::sleep(delay).await;
        Ok(backoff)
    }

    /// Reset the retry delay after any response that was not rate limited.
    pub async fn on_success(&self) {
        let mut state = self.state.lock().await;
        state.current_retry_delay = self.config.base_retry_delay;
        state.consecutive_hits = 0;
    }

    pub async fn current_retry_delay(&self) -> Duration {
        self.state.lock().await.current_retry_delay
    }

    pub async fn stats(&self) -> GovernorStats {
        let state = self.state.lock().await;
        GovernorStats {
            current_retry_delay: state.current_retry_delay,
            consecutive_hits: state.consecutive_hits,
            since_last_request: state.last_request.map(|t| t.elapsed()),
        }
    }
}

fn rand_jitter_ms(max: Duration) -> u64 {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return 0;
    }
    rand::rng().random_range(0..=max_ms)
}
