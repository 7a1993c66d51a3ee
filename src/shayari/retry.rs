use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use super::error::PipelineError;
use crate::ui::prelude::*;

/// Bounded exponential backoff for transient generation failures.
///
/// Applied by the backend clients around each external call. The
/// orchestrator itself never retries a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 5_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `attempt + 1` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    emit(
                        Level::Warn,
                        "shayari.retry",
                        &format!(
                            "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                            label,
                            attempt + 1,
                            attempts,
                            err,
                            delay.as_secs_f64()
                        ),
                        Some(serde_json::json!({
                            "operation": label,
                            "attempt": attempt + 1,
                            "max_attempts": attempts,
                            "delay_ms": delay.as_millis() as u64,
                        })),
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
