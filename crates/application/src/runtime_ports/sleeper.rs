use std::time::Duration;

use async_trait::async_trait;

/// Port for propagation waits, so tests can observe delays without sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the caller for the given duration.
    async fn sleep(&self, duration: Duration);
}
