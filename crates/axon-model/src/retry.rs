// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Retry with exponential backoff and jitter for transient provider errors.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::ProviderError;

/// Backoff configuration.  `delay_for` grows exponentially from
/// `initial_delay`, capped at `max_delay`, with a symmetric jitter band to
/// avoid synchronized retries from concurrent agents.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the delay used as the jitter band (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exp = base_ms * self.backoff_multiplier.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range - jitter_range / 2.0;

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, a non-retryable error occurs, or
/// `config.max_retries` retries are exhausted.
///
/// `on_retry(attempt, error)` is invoked before each backoff sleep so the
/// caller can surface the retry (structured event, log line).
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    mut on_retry: impl FnMut(u32, &ProviderError),
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_retryable() && attempt < config.max_retries => {
                on_retry(attempt, &err);
                sleep(config.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
