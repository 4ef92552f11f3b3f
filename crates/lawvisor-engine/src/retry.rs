//! Retry with exponential backoff for recoverable stage failures.
//!
//! Only errors the caller classifies as recoverable are retried. Anything
//! else is returned after the first attempt.

use std::fmt::Display;
use std::future::Future;

use lawvisor_core::RetryPolicy;
use tracing::warn;

/// The error that ended a retried operation and how many attempts were made.
#[derive(Debug)]
pub struct Attempted<E> {
    pub error: E,
    pub attempts: u32,
}

/// Run `f` up to `policy.max_attempts` times, sleeping
/// `base_delay_ms * 2^n` between attempts.
pub async fn retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    operation: &str,
    is_recoverable: R,
    mut f: F,
) -> Result<T, Attempted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempts += 1;
                if !is_recoverable(&error) || attempts >= max_attempts {
                    return Err(Attempted { error, attempts });
                }
                let delay = policy.delay(attempts - 1);
                warn!(
                    operation,
                    attempt = attempts,
                    max_attempts,
                    "{operation} failed, retrying in {delay:?}: {error}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
