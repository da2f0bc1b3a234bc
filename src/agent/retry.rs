use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::Result;

/// Retry policy applied to every tool call the agent makes.
///
/// Only transient failures (rate limits, 5xx, network) are retried; anything
/// else is returned on the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for ToolRetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for ToolRetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            initial_delay: Duration::from_secs_f64(config.initial_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(config.max_delay_secs.max(0.0)),
            jitter: config.jitter,
        }
    }
}

impl ToolRetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_multiplier(self.backoff_factor)
            .with_max_interval(self.max_delay)
            .with_randomization_factor(if self.jitter { 0.5 } else { 0.0 })
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `operation`, retrying transient failures with exponential backoff
    pub async fn run<T, F, Fut>(&self, tool_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempts <= self.max_retries => {
                    let delay = backoff.next_backoff().unwrap_or(self.max_delay);
                    warn!(
                        "Tool {} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        tool_name,
                        attempts,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
