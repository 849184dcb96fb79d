use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result, StageError};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::observe::{NoopObserver, PipelineObserver};

/// Attempt budget, per-attempt timeout and backoff for one stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    timeout: Duration,
    retry_delay: Duration,
    max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// `max_retries` is the total number of attempts and is clamped to at least 1.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            max_delay: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Cap a single backoff wait. Uncapped by default.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Wait between attempt `attempt` and `attempt + 1`: `retry_delay * 2^(attempt - 1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(exp));
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs a unit of work under a [`RetryPolicy`].
///
/// Every attempt calls the factory again, so the work is fully re-executed.
/// Timeouts and stage failures are retried alike; cancellation is not.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancelToken,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopObserver),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, stage: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StageError>>,
    {
        let max_retries = self.policy.max_retries();
        let timeout = self.policy.attempt_timeout();
        let mut attempt = 1u32;

        loop {
            if self.cancel.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::DEBUG,
                    event = "docpipe.cancelled",
                    stage = stage,
                    phase = "attempt",
                    "docpipe.cancelled"
                );
                return Err(Error::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(
                        tracing::Level::DEBUG,
                        event = "docpipe.cancelled",
                        stage = stage,
                        phase = "attempt",
                        "docpipe.cancelled"
                    );
                    return Err(Error::Cancelled);
                }
                res = tokio::time::timeout(timeout, op()) => res,
            };

            let error = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(source)) => Error::stage(stage, source),
                Err(_elapsed) => Error::Timeout {
                    stage: stage.to_owned(),
                    timeout,
                },
            };

            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::WARN,
                event = "docpipe.retry.attempt_failed",
                stage = stage,
                attempt = attempt,
                max_retries = max_retries,
                error = %error,
                "docpipe.retry.attempt_failed"
            );
            self.observer.attempt_failed(stage, attempt, &error);

            if attempt >= max_retries {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::ERROR,
                    event = "docpipe.retry.exhausted",
                    stage = stage,
                    attempts = max_retries,
                    error = %error,
                    "docpipe.retry.exhausted"
                );
                return Err(Error::retry_exhausted(stage, max_retries, error));
            }

            let delay = self.policy.backoff_delay(attempt);
            if !delay.is_zero() {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::WARN,
                    event = "docpipe.retry.sleep",
                    stage = stage,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "docpipe.retry.sleep"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        #[cfg(feature = "tracing")]
                        tracing::event!(
                            tracing::Level::DEBUG,
                            event = "docpipe.cancelled",
                            stage = stage,
                            phase = "backoff",
                            "docpipe.cancelled"
                        );
                        return Err(Error::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            attempt += 1;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
