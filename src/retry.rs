//! Linear-backoff retry of provider calls.

use crate::provider::LLMProvider;
use crate::Error;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    /// Replaces every provider's backoff unit when set.
    pub base_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Some(Duration::ZERO),
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `attempt * unit`.
    pub fn backoff(&self, attempt: u32, unit: Duration) -> Duration {
        self.base_delay.unwrap_or(unit) * attempt
    }

    /// Whether another attempt follows failed attempt `attempt`.
    pub fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt < self.max_attempts
    }

    /// Run `op` until it succeeds, fails terminally or runs out of attempts.
    ///
    /// Failures come back as [`Error::GenerationFailed`] carrying the number
    /// of attempts made.
    pub async fn run<P, T, F, Fut>(&self, provider: &P, mut op: F) -> Result<T, Error>
    where
        P: LLMProvider + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let retryable = provider.is_retryable_error(&e);
                    if !self.should_retry(attempt, retryable) {
                        return Err(Error::GenerationFailed {
                            provider: provider.kind().as_str().to_string(),
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.backoff(attempt, provider.backoff_unit());
                    warn!(
                        provider = %provider.kind(),
                        attempt,
                        max_attempts = self.max_attempts,
                        ?delay,
                        error = %e,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
