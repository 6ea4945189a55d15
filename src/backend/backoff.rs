//! Opt-in transport retry with exponential backoff and jitter.
//!
//! Pipelines are fail-fast: a provider error ends the run. Callers that want
//! to ride out rate limits (429) or flaky upstreams (5xx) set a
//! [`BackoffConfig`] on the [`ExecCtx`](crate::ExecCtx); the default never
//! retries.

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Retry policy for transient transport failures.
///
/// # Example
///
/// ```
/// use llm_runnables::backend::BackoffConfig;
///
/// assert_eq!(BackoffConfig::none().max_retries, 0);
/// assert_eq!(BackoffConfig::standard().max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of retries after the first attempt. Default: 0.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Randomize each delay uniformly in `[0, delay]`.
    pub jitter: bool,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
    /// Wait for the provider's `Retry-After` hint when present.
    pub respect_retry_after: bool,
}

impl BackoffConfig {
    /// No transport retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Cloud defaults: 3 retries, 1s initial, doubling, 60s cap, jittered.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: true,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        if self.jitter {
            Duration::from_secs_f64(fastrand::f64() * capped)
        } else {
            Duration::from_secs_f64(capped)
        }
    }

    /// Whether an error qualifies for another attempt.
    pub fn is_retryable(&self, error: &PipelineError) -> bool {
        match error {
            PipelineError::HttpError { status, .. } => self.retryable_statuses.contains(status),
            PipelineError::Request(_) | PipelineError::Timeout(_) => true,
            _ => false,
        }
    }

    fn next_delay(&self, attempt: u32, last_error: &PipelineError) -> Duration {
        match last_error {
            PipelineError::HttpError {
                retry_after: Some(hint),
                ..
            } if self.respect_retry_after => (*hint).min(self.max_delay),
            _ => self.delay_for_attempt(attempt),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Call `backend.complete` under the given retry policy.
///
/// `on_retry` receives `(attempt, delay, reason)` before each sleep. The last
/// error is returned unchanged once retries are exhausted or the error is not
/// retryable.
pub async fn with_backoff(
    backend: &dyn Backend,
    client: &Client,
    request: &LlmRequest,
    config: &BackoffConfig,
    cancel: Option<&AtomicBool>,
    mut on_retry: impl FnMut(u32, Duration, &str) + Send,
) -> Result<LlmResponse> {
    let cancelled = || cancel.is_some_and(|c| c.load(Ordering::Relaxed));
    let mut attempt = 0;

    loop {
        if cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let err = match backend.complete(client, request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if attempt >= config.max_retries || !config.is_retryable(&err) {
            return Err(err);
        }

        let delay = config.next_delay(attempt, &err);
        attempt += 1;
        tracing::debug!(
            backend = backend.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying provider call"
        );
        on_retry(attempt, delay, &err.to_string());
        tokio::time::sleep(delay).await;
    }
}
