//! WorkQueue port: the external work-queue service.

use async_trait::async_trait;

use crate::domain::{ItemId, ItemStatus, RunError, WorkItem};

/// The external queue service.
///
/// Delivery is at-least-once: an item that never reaches a terminal status
/// may be handed out again on a later run, so the core marks every
/// processed item Done or Failed exactly once.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Pop the next pending item from the named queue, if any.
    async fn fetch_next(&self, queue: &str) -> Result<Option<WorkItem>, RunError>;

    /// Record the terminal status of an item. `status` must be terminal.
    async fn set_status(&self, id: &ItemId, status: ItemStatus) -> Result<(), RunError>;
}
