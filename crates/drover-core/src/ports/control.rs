//! AppControl and Session ports: the external automated application.
//!
//! `AppControl` covers lifecycle management (the reset phases); `Session`
//! is one authenticated instance of the application, owned by exactly one
//! worker at a time, performing the side-effecting business operation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Payload, RunError};
use crate::ports::vault::Credential;

/// One session of the external application.
///
/// Sessions are provisioned in a pool (one per worker slot) by
/// [`AppControl::open_all`] and reused across batches within an attempt.
/// No session is ever driven by two workers concurrently.
#[async_trait]
pub trait Session: Send {
    /// Perform the business operation for one work item.
    ///
    /// `gate` serializes the one step of the operation that is not safe to
    /// run in parallel across sessions. Implementations must hold it only
    /// around that step; everything else runs unlocked.
    ///
    /// A broken business rule is reported as [`RunError::Business`] and
    /// stops the whole run; anything else is transient.
    async fn perform(
        &mut self,
        reference: &str,
        payload: &Payload,
        gate: Arc<Mutex<()>>,
    ) -> Result<(), RunError>;
}

/// Lifecycle control over the external application.
///
/// Every phase is idempotent: safe to call when the environment is already
/// in the target state (killing when nothing runs, cleaning an empty
/// workspace, and so on).
#[async_trait]
pub trait AppControl: Send + Sync {
    /// Clear filesystem/state residue left by a previous attempt.
    async fn cleanup(&self) -> Result<(), RunError>;

    /// Request graceful shutdown of all running instances.
    async fn close_all(&self) -> Result<(), RunError>;

    /// Forcefully terminate any instance still running.
    async fn kill_all(&self) -> Result<(), RunError>;

    /// Authenticate and provision `count` fresh sessions.
    async fn open_all(
        &self,
        credential: &Credential,
        count: usize,
    ) -> Result<Vec<Box<dyn Session>>, RunError>;
}
