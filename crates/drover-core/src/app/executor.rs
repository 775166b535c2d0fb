//! BatchExecutor: run one batch concurrently across the session pool.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, trace};

use crate::app::config::FailurePolicy;
use crate::domain::{ItemError, ItemStatus, Payload, RunError, WorkItem};
use crate::ports::{Session, WorkQueue};

/// Executes batches against a pool of sessions provisioned once per
/// attempt.
///
/// Each item is dispatched to exactly one worker task holding exactly one
/// session; the call joins the whole batch before returning, so the caller
/// never observes a partially finished batch. A single shared lock is
/// handed to every worker to serialize the one critical section of the
/// external operation; all other steps run in parallel.
pub struct BatchExecutor {
    queue: Arc<dyn WorkQueue>,
    sessions: Vec<Box<dyn Session>>,
    policy: FailurePolicy,
}

impl BatchExecutor {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        sessions: Vec<Box<dyn Session>>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            queue,
            sessions,
            policy,
        }
    }

    /// Process every item in the batch and write its terminal status.
    ///
    /// Returns `Err` when a worker hit a business rule (always), when a
    /// worker panicked, or when an operation failure occurred under
    /// [`FailurePolicy::Escalate`]. Payload defects stay item-scoped under
    /// either policy, since retrying the attempt cannot repair queued
    /// data. In every case the whole batch has joined first.
    pub async fn execute(&mut self, batch: Vec<WorkItem>) -> Result<(), RunError> {
        let gate = Arc::new(Mutex::new(()));
        let mut join = JoinSet::new();

        for item in batch {
            let mut session = self
                .sessions
                .pop()
                .ok_or_else(|| RunError::transient("batch larger than session pool"))?;
            let queue = Arc::clone(&self.queue);
            let gate = Arc::clone(&gate);

            join.spawn(async move {
                let result = run_item(&queue, session.as_mut(), &item, gate).await;
                (session, result)
            });
        }

        let mut failures: Vec<ItemError> = Vec::new();
        let mut panicked = false;
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((session, result)) => {
                    self.sessions.push(session);
                    if let Err(e) = result {
                        failures.push(e);
                    }
                }
                Err(join_err) => {
                    // The session in that task is lost; the next attempt
                    // provisions a fresh pool.
                    error!(error = %join_err, "worker panicked");
                    panicked = true;
                }
            }
        }

        if let Some(broken) = failures.iter().find_map(ItemError::business_source) {
            return Err(broken.clone());
        }
        if panicked {
            return Err(RunError::transient("a worker panicked during the batch"));
        }
        let operation_failures = failures
            .iter()
            .filter(|f| matches!(f, ItemError::Operation { .. }))
            .count();
        match self.policy {
            FailurePolicy::Contain => Ok(()),
            FailurePolicy::Escalate if operation_failures == 0 => Ok(()),
            FailurePolicy::Escalate => Err(RunError::transient(format!(
                "{operation_failures} item(s) in the batch failed"
            ))),
        }
    }
}

/// Process one item: parse, perform, record the terminal status.
async fn run_item(
    queue: &Arc<dyn WorkQueue>,
    session: &mut dyn Session,
    item: &WorkItem,
    gate: Arc<Mutex<()>>,
) -> Result<(), ItemError> {
    trace!(reference = %item.reference, "processing item");

    let outcome = match Payload::parse(&item.payload) {
        Ok(payload) => session
            .perform(&item.reference, &payload, gate)
            .await
            .map_err(|e| ItemError::operation(&item.reference, e)),
        Err(parse_err) => Err(ItemError::defect(&item.reference, parse_err.to_string())),
    };

    match outcome {
        Ok(()) => {
            queue
                .set_status(&item.id, ItemStatus::Done)
                .await
                .map_err(|e| ItemError::operation(&item.reference, e))?;
            trace!(reference = %item.reference, "item done");
            Ok(())
        }
        Err(e) => {
            error!(reference = %item.reference, error = %e, "item failed");
            if let Err(status_err) = queue.set_status(&item.id, ItemStatus::Failed).await {
                error!(reference = %item.reference, error = %status_err, "could not record item failure");
            }
            Err(e)
        }
    }
}
