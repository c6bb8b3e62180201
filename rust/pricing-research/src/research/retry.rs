//! Bounded retry with exponential backoff for idempotent reads.
//!
//! Only search and render calls go through here. Language model calls and
//! store writes are never retried.

use std::time::Duration;

use crate::error::{ResearchResult, Stage};

use super::context::RunContext;

/// Retry behaviour for transient upstream failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based), with up to 25% jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_ms = (capped.as_millis() / 4) as u64;
        if jitter_ms == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::random_range(0..=jitter_ms))
    }
}

/// Run an idempotent call, retrying transient failures.
///
/// Each attempt and each backoff races the run's cancellation and deadline.
/// Non-retryable errors (4xx other than 429, validation, parse) return at once.
pub async fn retry_idempotent<T, F, Fut>(
    policy: &RetryPolicy,
    ctx: &RunContext,
    stage: Stage,
    target: &str,
    mut op: F,
) -> ResearchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ResearchResult<T>>,
{
    let mut retry = 0;
    loop {
        match ctx.guard(stage, op()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    stage = %stage,
                    target,
                    retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient upstream failure, retrying"
                );
                ctx.sleep(stage, delay).await?;
            }
            Err(e) => return Err(e),
        }
    }
}
