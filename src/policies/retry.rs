//! # Bounded retry loop.
//!
//! [`RetryPolicy`] is the one retry primitive of the crate: an explicit loop
//! with a remaining-attempts counter and one fixed sleep per failed attempt.
//! It backs the responsiveness wait, the liveness probe and the status fetch.
//! Delays never grow.
//!
//! ```text
//! attempt 0 ──► op() ── Ok ──► return Ok
//!                 │
//!                 └─ Err ──► last attempt? ── yes ──► return Err
//!                                 │
//!                                 no ──► sleep(delay) ──► attempt + 1
//! ```
//!
//! ## Rules
//! - `attempts` counts calls to `op`, not retries; `0` is treated as `1`.
//! - No sleep after the final failed attempt.

use std::future::Future;
use std::time::Duration;

use tokio::time;

/// Attempt budget plus the delay between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of calls.
    pub attempts: u32,
    /// Delay after each failed call.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Four calls, 200ms apart.
    fn default() -> Self {
        Self::constant(4, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    /// `attempts` calls, `delay` apart.
    pub const fn constant(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Attempt budget clamped to at least one call.
    #[inline]
    pub fn attempts_clamped(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Worst-case time spent sleeping.
    pub fn sleep_budget(&self) -> Duration {
        self.delay.saturating_mul(self.attempts_clamped() - 1)
    }

    /// Runs `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 0-indexed attempt number. The error of the last
    /// attempt is returned on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts_clamped();
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt + 1 >= attempts => return Err(e),
                Err(_) => {
                    tracing::trace!(what, attempt = attempt + 1, attempts, delay = ?self.delay, "retrying");
                    time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Calls a boolean check until it reports `true` or the budget is spent.
    pub async fn poll<F, Fut>(&self, what: &'static str, mut check: F) -> bool
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        self.run(what, |attempt| {
            let fut = check(attempt);
            async move { if fut.await { Ok(()) } else { Err(()) } }
        })
        .await
        .is_ok()
    }
}
