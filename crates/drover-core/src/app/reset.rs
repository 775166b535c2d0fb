//! ResetLifecycle: bring the external environment to a known clean state.

use std::sync::Arc;

use tracing::{error, trace};

use crate::domain::RunError;
use crate::ports::{AppControl, Session, Vault};

/// Runs the reset phases around every attempt and the terminal teardown
/// at the end of the run.
///
/// `reset()` always executes cleanup -> close_all -> kill_all -> open_all
/// in that order, unconditionally; `teardown()` is the same sequence minus
/// open_all. Every phase is idempotent on the `AppControl` side.
pub struct ResetLifecycle {
    control: Arc<dyn AppControl>,
    vault: Arc<dyn Vault>,
    credential_name: String,
    session_count: usize,
}

impl ResetLifecycle {
    pub fn new(
        control: Arc<dyn AppControl>,
        vault: Arc<dyn Vault>,
        credential_name: impl Into<String>,
        session_count: usize,
    ) -> Self {
        Self {
            control,
            vault,
            credential_name: credential_name.into(),
            session_count,
        }
    }

    /// Full reset before an attempt. Returns the fresh session pool.
    pub async fn reset(&self) -> Result<Vec<Box<dyn Session>>, RunError> {
        trace!("resetting");
        self.cleanup().await?;
        self.close_all().await?;
        self.kill_all().await?;
        self.open_all().await
    }

    /// Terminal teardown, run exactly once after the retry loop exits.
    ///
    /// Best-effort: a failing phase is logged and the remaining phases
    /// still run, since the run outcome is already decided.
    pub async fn teardown(&self) {
        trace!("final teardown");
        if let Err(e) = self.cleanup().await {
            error!(error = %e, "cleanup failed during teardown");
        }
        if let Err(e) = self.close_all().await {
            error!(error = %e, "close_all failed during teardown");
        }
        if let Err(e) = self.kill_all().await {
            error!(error = %e, "kill_all failed during teardown");
        }
    }

    async fn cleanup(&self) -> Result<(), RunError> {
        trace!("doing cleanup");
        self.control.cleanup().await
    }

    async fn close_all(&self) -> Result<(), RunError> {
        trace!("closing all applications");
        self.control.close_all().await
    }

    async fn kill_all(&self) -> Result<(), RunError> {
        trace!("killing all applications");
        self.control.kill_all().await
    }

    async fn open_all(&self) -> Result<Vec<Box<dyn Session>>, RunError> {
        trace!("opening all applications");
        let credential = self.vault.credential(&self.credential_name).await?;
        self.control
            .open_all(&credential, self.session_count)
            .await
    }
}
