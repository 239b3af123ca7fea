use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use convergent_core::{AppError, AppResult};

use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink, Sleeper};

/// Fixed-interval retry budget for propagation-pending authorization errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between attempts.
    pub interval: Duration,
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a retry policy.
    pub fn new(interval: Duration, max_attempts: u32) -> AppResult<Self> {
        if max_attempts == 0 {
            return Err(AppError::Validation(
                "retry policy requires at least one attempt".to_owned(),
            ));
        }

        Ok(Self {
            interval,
            max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 360,
        }
    }
}

/// Retries actions while authorization grants propagate.
#[derive(Clone)]
pub struct TransientRetry {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn BootstrapEventSink>,
}

impl TransientRetry {
    /// Creates a retry helper.
    #[must_use]
    pub fn new(
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
        events: Arc<dyn BootstrapEventSink>,
    ) -> Self {
        Self {
            policy,
            sleeper,
            events,
        }
    }

    /// Runs `action` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent.
    ///
    /// Only [`AppError::TransientAuthorization`] is retried. When the budget
    /// runs out the last transient error is returned.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut action: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(error)
                    if error.is_transient_authorization() && attempt < self.policy.max_attempts =>
                {
                    tracing::debug!(operation, attempt, error = %error, "authorization not yet propagated");
                    self.events.record(BootstrapEvent::TransientRetryScheduled {
                        operation: operation.to_owned(),
                        attempt,
                        wait: self.policy.interval,
                    });
                    self.sleeper.sleep(self.policy.interval).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
