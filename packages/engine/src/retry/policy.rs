//! Retry policy configuration with bounded exponential backoff

use std::time::Duration;

use crate::error::{CertError, Result};

/// Retry policy configuration - all durations in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay in milliseconds before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Backoff multiplier applied per retry
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// Three attempts, 100ms then 200ms between them
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    #[inline]
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Validate policy configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CertError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.backoff_multiplier <= 0.0 {
            return Err(CertError::Config("backoff_multiplier must be positive".to_string()));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(CertError::Config(
                "initial_delay_ms cannot exceed max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}
