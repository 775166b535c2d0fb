//! RunController: the outer bounded-retry loop.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::batch::BatchScheduler;
use crate::app::config::RunConfig;
use crate::app::executor::BatchExecutor;
use crate::app::reset::ResetLifecycle;
use crate::domain::{DrainStop, FatalRunError, RunError, RunReport, RunState, RunVerdict};
use crate::ports::{AppControl, Notifier, Vault, WorkQueue};

/// Drives a whole run: up to `max_retry_count` attempts of reset + drain,
/// then one unconditional teardown.
///
/// Error classification at this boundary is a plain match on
/// [`RunError`]: a business error notifies and aborts the run regardless
/// of remaining budget; anything else notifies, spends one unit of budget
/// and starts a fresh attempt. Counters carry across attempts, so retried
/// work never restarts from zero.
pub struct RunController {
    config: RunConfig,
    queue: Arc<dyn WorkQueue>,
    vault: Arc<dyn Vault>,
    control: Arc<dyn AppControl>,
    notifier: Arc<dyn Notifier>,
}

impl RunController {
    pub fn new(
        config: RunConfig,
        queue: Arc<dyn WorkQueue>,
        vault: Arc<dyn Vault>,
        control: Arc<dyn AppControl>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            queue,
            vault,
            control,
            notifier,
        }
    }

    /// Run to completion.
    ///
    /// `Err` exactly when every attempt ended in a transient error; a
    /// business abort is reported through [`RunVerdict::BusinessAborted`]
    /// so the caller can tell the two failure modes apart.
    pub async fn run(&self) -> Result<RunReport, FatalRunError> {
        info!(process = %self.config.process_name, queue = %self.config.queue_name, "run started");

        let lifecycle = ResetLifecycle::new(
            Arc::clone(&self.control),
            Arc::clone(&self.vault),
            self.config.credential_name.clone(),
            self.config.thread_count,
        );

        // Resolved once per run. Notification is best-effort, so a missing
        // recipient downgrades to a warning instead of failing the run.
        let recipient = match self
            .vault
            .constant(&self.config.error_recipient_constant)
            .await
        {
            Ok(recipient) => Some(recipient),
            Err(e) => {
                warn!(
                    constant = %self.config.error_recipient_constant,
                    error = %e,
                    "error recipient unavailable; notifications disabled for this run"
                );
                None
            }
        };

        let mut state = RunState::default();
        let mut verdict = None;

        for attempt in 1..=self.config.max_retry_count {
            match self.attempt(&lifecycle, &mut state).await {
                Ok(stop) => {
                    verdict = Some(RunVerdict::Completed(stop));
                    break;
                }
                Err(RunError::Business(message)) => {
                    let err = RunError::Business(message.clone());
                    error!(attempt, error = %err, "business rule broken; stopping the run");
                    self.notify(recipient.as_deref(), &err).await;
                    verdict = Some(RunVerdict::BusinessAborted(message));
                    break;
                }
                Err(err) => {
                    state.error_count += 1;
                    error!(
                        attempt,
                        errors = state.error_count,
                        error = %err,
                        "error caught during attempt"
                    );
                    self.notify(recipient.as_deref(), &err).await;
                }
            }
        }

        // Exactly once, on every exit path.
        lifecycle.teardown().await;

        match verdict {
            Some(verdict) => {
                info!(
                    processed = state.tasks_processed,
                    errors = state.error_count,
                    "run finished"
                );
                Ok(RunReport {
                    verdict,
                    tasks_processed: state.tasks_processed,
                    transient_errors: state.error_count,
                })
            }
            None => {
                error!(attempts = state.error_count, "run failed too many times");
                Err(FatalRunError {
                    attempts: state.error_count,
                })
            }
        }
    }

    /// One attempt: full reset, then drain to a normal stop.
    async fn attempt(
        &self,
        lifecycle: &ResetLifecycle,
        state: &mut RunState,
    ) -> Result<DrainStop, RunError> {
        let sessions = lifecycle.reset().await?;
        let mut executor = BatchExecutor::new(
            Arc::clone(&self.queue),
            sessions,
            self.config.failure_policy,
        );
        let scheduler = BatchScheduler::new(
            Arc::clone(&self.queue),
            self.config.queue_name.clone(),
            self.config.thread_count,
            self.config.max_task_count,
        );
        scheduler.drain(state, &mut executor).await
    }

    async fn notify(&self, recipient: Option<&str>, error: &RunError) {
        let Some(recipient) = recipient else {
            warn!("no recipient configured; skipping error notification");
            return;
        };
        if let Err(e) = self
            .notifier
            .notify(recipient, &self.config.process_name, error)
            .await
        {
            warn!(error = %e, "failed to send error notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::FailurePolicy;
    use crate::domain::ItemStatus;
    use crate::impls::memory_queue::InMemoryQueue;
    use crate::impls::sim::{Phase, RecordingNotifier, SimApp, SimOutcome, SimVault};
    use crate::ports::Credential;

    const QUEUE: &str = "test-queue";

    struct Fixture {
        queue: Arc<InMemoryQueue>,
        vault: Arc<SimVault>,
        app: Arc<SimApp>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new() -> Self {
            let vault = SimVault::new();
            vault.add_credential(
                "app-login",
                Credential {
                    username: "robot".into(),
                    password: "hunter2".into(),
                },
            );
            vault.add_constant("error-email", "ops@example.org");
            Self {
                queue: Arc::new(InMemoryQueue::new(QUEUE)),
                vault: Arc::new(vault),
                app: Arc::new(SimApp::new()),
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        async fn seed(&self, count: usize) {
            for i in 0..count {
                self.queue
                    .seed(
                        format!("r{i}"),
                        serde_json::json!({"category": "note", "note": "n"}),
                    )
                    .await;
            }
        }

        fn controller(&self, config: RunConfig) -> RunController {
            RunController::new(
                config,
                self.queue.clone(),
                self.vault.clone(),
                self.app.clone(),
                self.notifier.clone(),
            )
        }

        fn config(&self) -> RunConfig {
            let mut config = RunConfig::new(QUEUE);
            config.thread_count = 2;
            config
        }
    }

    fn phase_count(journal: &[Phase], phase: Phase) -> usize {
        journal.iter().filter(|p| **p == phase).count()
    }

    #[tokio::test]
    async fn clean_run_drains_the_queue_in_one_attempt() {
        let fx = Fixture::new();
        fx.seed(5).await;
        let controller = fx.controller(fx.config());

        let report = controller.run().await.unwrap();

        assert_eq!(report.verdict, RunVerdict::Completed(DrainStop::Exhausted));
        assert_eq!(report.tasks_processed, 5);
        assert_eq!(report.transient_errors, 0);
        let statuses = fx.queue.statuses().await;
        assert_eq!(statuses.len(), 5);
        assert!(statuses.values().all(|s| *s == ItemStatus::Done));

        // One reset and one terminal teardown.
        let journal = fx.app.journal();
        assert_eq!(phase_count(&journal, Phase::OpenAll), 1);
        assert_eq!(phase_count(&journal, Phase::Cleanup), 2);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn reset_failures_exhaust_the_budget() {
        let fx = Fixture::new();
        fx.seed(3).await;
        fx.app.fail_next_opens(u32::MAX);
        let controller = fx.controller(fx.config());

        let fatal = controller.run().await.unwrap_err();

        assert_eq!(fatal.attempts, 3);
        // Three failed attempts, three notifications, nothing processed.
        assert_eq!(fx.notifier.sent().len(), 3);
        assert_eq!(fx.queue.pending_len().await, 3);
        // Teardown still ran after the loop: 3 resets + 1 teardown.
        let journal = fx.app.journal();
        assert_eq!(phase_count(&journal, Phase::Cleanup), 4);
        assert_eq!(phase_count(&journal, Phase::OpenAll), 3);
        assert!(journal.ends_with(&[Phase::Cleanup, Phase::CloseAll, Phase::KillAll]));
    }

    #[tokio::test]
    async fn one_transient_attempt_then_success_keeps_counters() {
        let fx = Fixture::new();
        fx.seed(4).await;
        // r3 fails attempt one; it is terminal afterwards, so attempt two
        // finds the queue empty and completes.
        fx.app.script("r3", SimOutcome::Fail);
        let mut config = fx.config();
        config.failure_policy = FailurePolicy::Escalate;
        let controller = fx.controller(config);

        let report = controller.run().await.unwrap();

        assert_eq!(report.verdict, RunVerdict::Completed(DrainStop::Exhausted));
        // All four items were pulled during attempt one and stay counted.
        assert_eq!(report.tasks_processed, 4);
        assert_eq!(report.transient_errors, 1);
        assert_eq!(fx.notifier.sent().len(), 1);

        let statuses = fx.queue.statuses().await;
        assert_eq!(
            statuses.values().filter(|s| **s == ItemStatus::Done).count(),
            3
        );
        assert_eq!(
            statuses
                .values()
                .filter(|s| **s == ItemStatus::Failed)
                .count(),
            1
        );

        // Two resets (attempt one and two) and one terminal teardown.
        let journal = fx.app.journal();
        assert_eq!(phase_count(&journal, Phase::OpenAll), 2);
        assert_eq!(phase_count(&journal, Phase::Cleanup), 3);
    }

    #[tokio::test]
    async fn business_error_aborts_without_spending_the_budget() {
        let fx = Fixture::new();
        fx.seed(6).await;
        fx.app.script("r1", SimOutcome::Business);
        let controller = fx.controller(fx.config());

        let report = controller.run().await.unwrap();

        let RunVerdict::BusinessAborted(message) = &report.verdict else {
            panic!("expected a business abort, got {:?}", report.verdict);
        };
        assert!(message.contains("r1"));
        assert_eq!(report.transient_errors, 0);
        // One attempt only, then the teardown; the remaining items were
        // never pulled.
        let journal = fx.app.journal();
        assert_eq!(phase_count(&journal, Phase::OpenAll), 1);
        assert_eq!(phase_count(&journal, Phase::Cleanup), 2);
        assert!(journal.ends_with(&[Phase::Cleanup, Phase::CloseAll, Phase::KillAll]));
        assert_eq!(fx.notifier.sent().len(), 1);
        assert_eq!(fx.queue.pending_len().await, 4);
    }

    #[tokio::test]
    async fn task_cap_holds_across_attempts() {
        let fx = Fixture::new();
        fx.seed(10).await;
        fx.app.script("r1", SimOutcome::Fail);
        let mut config = fx.config();
        config.max_task_count = 3;
        config.failure_policy = FailurePolicy::Escalate;
        let controller = fx.controller(config);

        let report = controller.run().await.unwrap();

        // Attempt one pulled r0+r1 (r1 failed); attempt two had headroom
        // for exactly one more pull.
        assert_eq!(report.verdict, RunVerdict::Completed(DrainStop::LimitReached));
        assert_eq!(report.tasks_processed, 3);
        assert_eq!(report.transient_errors, 1);
        assert_eq!(fx.queue.pending_len().await, 7);
    }

    #[tokio::test]
    async fn missing_recipient_disables_notifications_but_not_the_run() {
        let fx = Fixture::new();
        fx.seed(2).await;
        let mut config = fx.config();
        config.error_recipient_constant = "not-a-constant".into();
        fx.app.fail_next_opens(1);
        let controller = fx.controller(config);

        let report = controller.run().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.transient_errors, 1);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_is_swallowed() {
        let fx = Fixture::new();
        fx.seed(2).await;
        fx.app.fail_next_opens(1);
        fx.notifier.fail_deliveries(true);
        let controller = fx.controller(fx.config());

        let report = controller.run().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.transient_errors, 1);
    }
}
