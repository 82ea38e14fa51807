//! Bounded retry scheduling for expensive or flaky resources.
//!
//! The core is [`Backoff`], an explicit state object holding a capped
//! Fibonacci delay ladder. The owner advances it one attempt at a time and
//! reads back either the next delay or exhaustion; nothing is scheduled
//! implicitly. [`retry_with_backoff`] wraps the same ladder around any
//! fallible async operation.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Configuration for a delay ladder.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Number of attempts before the ladder is exhausted.
    pub max_attempts: u32,
    /// First delay; also the Fibonacci seed.
    pub initial_delay: Duration,
    /// Ceiling applied to every delay in the ladder.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Result of advancing the ladder by one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Wait this long, then retry.
    Scheduled(Duration),
    /// All attempts consumed; the operation is terminally failed.
    Exhausted,
}

/// A finite, capped Fibonacci delay ladder (1s, 1s, 2s, 3s, 5s, 8s, ...).
///
/// Owned by exactly one caller; the owner is responsible for ensuring only a
/// single retry cycle is in flight at a time.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    curr: Duration,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay;
        Self {
            config,
            curr: initial,
            next: initial,
            attempts: 0,
        }
    }

    /// Consumes the next rung of the ladder.
    pub fn advance(&mut self) -> Advance {
        if self.attempts >= self.config.max_attempts {
            return Advance::Exhausted;
        }

        let delay = self.curr.min(self.config.max_delay);
        let after = self.curr + self.next;
        self.curr = self.next;
        self.next = after;
        self.attempts += 1;

        Advance::Scheduled(delay)
    }

    /// Restarts the ladder from attempt 0. Used when a previously healthy
    /// resource fails again, so a long-lived connection is not penalized by
    /// stale attempt counts.
    pub fn reset(&mut self) {
        self.curr = self.config.initial_delay;
        self.next = self.config.initial_delay;
        self.attempts = 0;
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }
}

/// Runs `op` until it succeeds or the ladder is exhausted, sleeping between
/// attempts. Returns the last error on exhaustion.
///
/// The operation executes once more than `max_attempts`: the initial call
/// plus one call per scheduled retry.
pub async fn retry_with_backoff<T, E, F, Fut>(config: BackoffConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = Backoff::new(config);

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => match backoff.advance() {
                Advance::Scheduled(delay) => {
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = backoff.attempts_made(),
                        "operation failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Advance::Exhausted => return Err(err),
            },
        }
    }
}
