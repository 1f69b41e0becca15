//! Bounded retry for RPC operations
//!
//! Every retried operation declares its own policy: a maximum attempt
//! count plus a backoff function. Connection setup uses linear backoff,
//! receipt/transaction fetches use a fixed delay.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// Delay grows with the attempt number: attempt 1 waits one step,
    /// attempt 2 waits two steps, and so on.
    Linear(Duration),
}

/// A bounded retry policy: how often to try and how long to wait.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Policy with a fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Policy with a linearly growing delay.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step * attempt,
        }
    }
}

/// Run an async operation under a retry policy.
///
/// Retries on every `Err` until the attempt budget is exhausted, then
/// returns the last error with an attempt-count context. `context` names
/// the operation for log lines.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, context: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= policy.max_attempts {
                    error!(
                        "'{}' failed after {} attempts. Final error: {}",
                        context, attempt, e
                    );
                    return Err(e.context(format!("Failed after {} attempts", attempt)));
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} for '{}' failed: {}. Retrying in {:?}...",
                    attempt, policy.max_attempts, context, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
