//! Typed errors exposed to callers
//!
//! Most plumbing errors travel as `anyhow::Error` with context. The one
//! failure callers need to match on is connection initialization, which
//! is fatal once the retry budget is gone.

use thiserror::Error;

/// Provider connection could not be established within the retry budget.
#[derive(Debug, Error)]
#[error("provider connection failed after {attempts} attempts: {last_error}")]
pub struct ProviderInitError {
    /// How many connection attempts were made before giving up.
    pub attempts: u32,
    /// The final attempt's error, rendered.
    pub last_error: String,
}
