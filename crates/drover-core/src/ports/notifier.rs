//! Notifier port: best-effort failure notification.

use async_trait::async_trait;

use crate::domain::RunError;

/// Delivery failed. Never retried and never fatal to the run; the
/// controller logs it and moves on.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers failure notifications to a fixed recipient.
///
/// Implementations capture a point-in-time diagnostic artifact of the
/// environment (the original system attached a screenshot) and send it
/// together with the error text and the process identity.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient: &str,
        process: &str,
        error: &RunError,
    ) -> Result<(), NotifyError>;
}
