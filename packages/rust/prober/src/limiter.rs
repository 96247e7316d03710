//! Per-rate-class token buckets.
//!
//! Every platform names a rate class; all platforms in a class share one
//! [`TokenBucket`]. A 429 from any of them trips a cooldown on the whole class
//! while other classes keep running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dossier_shared::{RateClassLimit, RateLimitsConfig};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
}

/// Why a token is not available right now.
#[derive(Debug, Clone, Copy)]
enum TokenWait {
    Refill(Duration),
    Cooldown(Duration),
    Never,
}

/// Token bucket with an optional cooldown window. The lock is never held
/// while waiting.
#[derive(Debug)]
pub struct TokenBucket {
    class: String,
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(class: impl Into<String>, limit: RateClassLimit) -> Self {
        let capacity = f64::from(limit.capacity.max(1));
        Self {
            class: class.into(),
            capacity,
            refill_per_sec: limit.refill_per_sec.max(0.0),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                cooldown_until: None,
            }),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Take one token, waiting at most `max_wait`.
    ///
    /// Sleeps toward the next refill until the budget is spent, so a `false`
    /// means the whole wait elapsed. A cooldown that outlasts the budget, or a
    /// class that never refills, fails without sleeping.
    pub async fn acquire(&self, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            let wait = match self.try_take().await {
                Ok(()) => return true,
                Err(TokenWait::Never) => {
                    debug!(class = %self.class, "class does not refill");
                    return false;
                }
                Err(TokenWait::Cooldown(wait)) if Instant::now() + wait > deadline => {
                    debug!(class = %self.class, wait_ms = wait.as_millis() as u64, "cooldown exceeds wait budget");
                    return false;
                }
                Err(TokenWait::Cooldown(wait) | TokenWait::Refill(wait)) => wait,
            };
            let now = Instant::now();
            if now >= deadline {
                debug!(class = %self.class, "token wait budget spent");
                return false;
            }
            tokio::time::sleep(wait.min(deadline - now)).await;
        }
    }

    /// Take a token now, or report how long until one is available.
    async fn try_take(&self) -> Result<(), TokenWait> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(until) = state.cooldown_until {
            if now < until {
                return Err(TokenWait::Cooldown(until - now));
            }
            state.cooldown_until = None;
            state.last_refill = now;
        }

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        if self.refill_per_sec <= 0.0 {
            return Err(TokenWait::Never);
        }
        let missing = 1.0 - state.tokens;
        Err(TokenWait::Refill(Duration::from_secs_f64(missing / self.refill_per_sec)))
    }

    /// Block the class for `duration` and drain its tokens. An existing
    /// longer cooldown is kept.
    pub async fn trip_cooldown(&self, duration: Duration) {
        let mut state = self.state.lock().await;
        let until = Instant::now() + duration;
        if state.cooldown_until.is_none_or(|current| current < until) {
            state.cooldown_until = Some(until);
        }
        state.tokens = 0.0;
        warn!(class = %self.class, cooldown_secs = duration.as_secs(), "rate class cooling down");
    }

    pub async fn in_cooldown(&self) -> bool {
        let state = self.state.lock().await;
        state.cooldown_until.is_some_and(|until| Instant::now() < until)
    }
}

/// Lazily-created buckets, one per rate class.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    config: Arc<RateLimitsConfig>,
    buckets: Arc<Mutex<HashMap<String, Arc<TokenBucket>>>>,
}

impl RateLimiters {
    pub fn new(config: RateLimitsConfig) -> Self {
        Self {
            config: Arc::new(config),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The bucket for `class`, created from config on first use.
    pub async fn bucket(&self, class: &str) -> Arc<TokenBucket> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(class.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(class, self.config.limit_for(class))))
            .clone()
    }
}
