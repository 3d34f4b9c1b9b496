//! Rate-Limited Text Client
//!
//! Wraps a [`TextGenerator`] with request spacing, a daily call ceiling and
//! exponential backoff on vendor throttling. One instance is shared by the
//! whole process; its counters live as long as the process does.
//!
//! The spacing check is advisory under concurrency: the last-request time is
//! read, the lock is released for the sleep, and the time is written back
//! afterwards, so two requests that interleave around the check can both
//! dispatch inside the same interval. Only a single instance is assumed; a
//! horizontally scaled deployment would need the counters in a shared store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, warn};

use crate::error::{LessonError, LessonResult};
use crate::llm_client::TextGenerator;

/// Tunables for [`RateLimitedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Minimum time between two dispatched requests.
    pub min_interval: Duration,
    /// Successful calls allowed before the process refuses further calls.
    pub max_daily: u32,
    /// Total attempts made for one call when the vendor keeps throttling.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(4000),
            max_daily: 1400,
            max_retries: 3,
            initial_backoff: Duration::from_millis(5000),
            max_backoff: Duration::from_millis(60000),
        }
    }
}

impl RateLimitPolicy {
    /// Delay after the given failed attempt (1-based): doubles from
    /// `initial_backoff`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Default)]
struct RateLimitState {
    last_request: Option<Instant>,
    daily_count: u32,
}

/// Text client enforcing spacing, a daily ceiling and throttling retries.
pub struct RateLimitedClient {
    inner: Option<Arc<dyn TextGenerator>>,
    policy: RateLimitPolicy,
    state: Mutex<RateLimitState>,
}

impl RateLimitedClient {
    pub fn new(inner: Arc<dyn TextGenerator>, policy: RateLimitPolicy) -> Self {
        Self {
            inner: Some(inner),
            policy,
            state: Mutex::new(RateLimitState::default()),
        }
    }

    /// A client with no vendor credential. Every call fails with a
    /// configuration error.
    pub fn unconfigured(policy: RateLimitPolicy) -> Self {
        Self {
            inner: None,
            policy,
            state: Mutex::new(RateLimitState::default()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Number of successful calls made by this process.
    pub fn daily_count(&self) -> u32 {
        self.lock().daily_count
    }

    /// Issues one generation call and returns the trimmed model text.
    pub async fn generate(&self, prompt: &str) -> LessonResult<String> {
        let inner = self.inner.as_ref().ok_or_else(|| {
            LessonError::Configuration("Text model API key is not configured".into())
        })?;

        let count = self.daily_count();
        if count >= self.policy.max_daily {
            warn!(
                daily_count = count,
                max_daily = self.policy.max_daily,
                "Daily text request ceiling reached"
            );
            return Err(LessonError::QuotaExceeded(
                "Daily API quota exceeded - please try again tomorrow".into(),
            ));
        }

        let attempts = self.policy.max_retries.max(1);
        let strategy = (1..attempts).map(|attempt| self.policy.backoff_for(attempt));
        let attempt = &AtomicU32::new(0);

        let result = Retry::spawn(strategy, move || async move {
            let attempt = attempt.fetch_add(1, Ordering::Relaxed) + 1;
            self.wait_for_slot().await;
            debug!(attempt, "Dispatching text generation request");

            match inner.generate(prompt).await {
                Ok(text) => Ok(text),
                Err(e) if e.is_throttling() => {
                    warn!(attempt, error = %e, "Text model throttled");
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Text generation failed");
                    Err(RetryError::Permanent(e))
                }
            }
        })
        .await;

        match result {
            Ok(text) => {
                let daily_count = {
                    let mut state = self.lock();
                    state.daily_count += 1;
                    state.daily_count
                };
                info!(daily_count, "Text generation succeeded");
                Ok(text.trim().to_string())
            }
            Err(e) if e.is_throttling() => {
                warn!(attempts, error = %e, "Text model still throttled, giving up");
                Err(LessonError::QuotaExceeded(
                    "Rate limit exceeded - please try again later".into(),
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Sleeps until the minimum interval since the previous dispatch has
    /// passed, then records the dispatch time.
    async fn wait_for_slot(&self) {
        let wait = self
            .lock()
            .last_request
            .map(|last| self.policy.min_interval.saturating_sub(last.elapsed()))
            .unwrap_or_default();

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit slot");
            sleep(wait).await;
        }

        self.lock().last_request = Some(Instant::now());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
