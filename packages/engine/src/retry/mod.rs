//! Bounded retry for transient failures
//!
//! Only errors reporting [`CertError::is_transient`] are retried; everything
//! else is returned on the first occurrence.

pub mod policy;

pub use policy::RetryPolicy;

use crate::error::{CertError, Result};

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// Blocks the calling thread between attempts. When attempts are exhausted the
/// last transient error is converted into [`CertError::GenerationFailed`].
pub fn execute_with_retry<T, F>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    policy.validate()?;
    let mut attempt = 1;

    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.calculate_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "transient failure, retrying: {err}"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                return Err(CertError::GenerationFailed(format!(
                    "giving up after {attempt} attempts: {err}"
                )));
            }
            Err(err) => return Err(err),
        }
    }
}
