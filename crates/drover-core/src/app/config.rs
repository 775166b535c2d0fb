//! Run configuration.

/// What to do when one item in a batch fails for an ordinary
/// (non-business) reason.
///
/// Business-rule failures are not governed by this policy: they always
/// escape the batch and abort the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Mark the item Failed and keep going; siblings and the attempt are
    /// unaffected.
    #[default]
    Contain,

    /// Mark the item Failed, finish the batch, then fail the attempt with
    /// a transient error so it counts against the retry budget.
    Escalate,
}

/// Externally supplied configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Outer attempts before the run is declared failed.
    pub max_retry_count: u32,

    /// Per-run dequeue cap, across all attempts.
    pub max_task_count: u32,

    /// Batch size and worker pool size.
    pub thread_count: usize,

    /// Name of the queue to drain.
    pub queue_name: String,

    /// Process identity included in failure notifications.
    pub process_name: String,

    /// Vault name of the application login credential.
    pub credential_name: String,

    /// Vault name of the constant holding the notification recipient.
    pub error_recipient_constant: String,

    pub failure_policy: FailurePolicy,
}

impl RunConfig {
    /// Configuration with the standard deployment defaults: 3 retries,
    /// 600-item cap, 6 workers, contained item failures.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            max_retry_count: 3,
            max_task_count: 600,
            thread_count: 6,
            queue_name: queue_name.into(),
            process_name: "drover".to_string(),
            credential_name: "app-login".to_string(),
            error_recipient_constant: "error-email".to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }
}
