//! Demo run against the simulated collaborators.
//!
//! Seeds an in-memory queue, drives one full run and maps the outcome to
//! the process exit code: 0 on success, 1 when the retry budget was
//! exhausted, 2 on a business abort.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use drover_core::app::{RunConfig, RunController};
use drover_core::domain::RunVerdict;
use drover_core::impls::{InMemoryQueue, RecordingNotifier, SimApp, SimOutcome, SimVault};
use drover_core::ports::Credential;

const QUEUE_NAME: &str = "journal-notes";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let queue = Arc::new(InMemoryQueue::new(QUEUE_NAME));
    for i in 0..14 {
        queue
            .seed(
                format!("case-{i:03}"),
                serde_json::json!({
                    "category": "journal-note",
                    "note": format!("automated note #{i}"),
                    "detail": if i % 3 == 0 { "follow-up agreed" } else { "" },
                }),
            )
            .await;
    }

    let vault = SimVault::new();
    vault.add_credential(
        "app-login",
        Credential {
            username: "robot".into(),
            password: "hunter2".into(),
        },
    );
    vault.add_constant("error-email", "ops@example.org");

    // One flaky case, to show a contained item failure.
    let app = Arc::new(SimApp::new());
    app.script("case-007", SimOutcome::Fail);

    let notifier = Arc::new(RecordingNotifier::new());
    let controller = RunController::new(
        RunConfig::new(QUEUE_NAME),
        queue.clone(),
        Arc::new(vault),
        app.clone(),
        notifier.clone(),
    );

    // Top-level wrapper: every failure is logged here before the process
    // exits, whatever the path.
    match controller.run().await {
        Ok(report) => {
            for (id, status) in queue.statuses().await {
                info!(item = %id, status = ?status, "item result");
            }
            match report.verdict {
                RunVerdict::Completed(stop) => {
                    info!(
                        ?stop,
                        processed = report.tasks_processed,
                        errors = report.transient_errors,
                        "run completed"
                    );
                    ExitCode::SUCCESS
                }
                RunVerdict::BusinessAborted(message) => {
                    error!(%message, "run aborted by a business rule");
                    ExitCode::from(2)
                }
            }
        }
        Err(fatal) => {
            for notification in notifier.sent() {
                error!(
                    recipient = %notification.recipient,
                    error = %notification.error,
                    "notification sent"
                );
            }
            error!(error = %fatal, "run failed");
            ExitCode::FAILURE
        }
    }
}
