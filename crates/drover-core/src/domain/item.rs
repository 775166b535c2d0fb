//! Work item model: what the external queue hands us.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identity of a queue item. Minted by the queue service; the core
/// only carries it back when recording a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a queue item.
///
/// Transitions exactly once, Pending -> Done or Pending -> Failed, written
/// by the one worker that processed the item. Never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Done,
    Failed,
}

impl ItemStatus {
    /// Done or Failed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }
}

/// One unit of work pulled from the external queue.
///
/// The core reads `payload` and writes `status` (through the queue port);
/// everything else is owned by the queue service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,

    /// External case/business reference, used by the automated operation.
    pub reference: String,

    /// Raw JSON document; parsed into [`Payload`] at the item boundary.
    pub payload: serde_json::Value,

    pub status: ItemStatus,

    pub created_at: DateTime<Utc>,
}

/// The queued payload is malformed. A defect in the data, not a condition
/// a retry can clear.
#[derive(Debug, Clone, Error)]
#[error("malformed payload: {0}")]
pub struct PayloadError(String);

/// The payload fields the external operation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub category: String,
    pub note: String,
    pub detail: Option<String>,
}

impl Payload {
    /// Parse the raw queue payload.
    ///
    /// A missing required field is a defect in the queued data, scoped to
    /// this one item. An empty `detail` is normalized to `None`.
    pub fn parse(raw: &serde_json::Value) -> Result<Self, PayloadError> {
        #[derive(Deserialize)]
        struct Raw {
            category: String,
            note: String,
            #[serde(default)]
            detail: Option<String>,
        }

        let raw: Raw =
            serde_json::from_value(raw.clone()).map_err(|e| PayloadError(e.to_string()))?;

        Ok(Self {
            category: raw.category,
            note: raw.note,
            detail: raw.detail.filter(|d| !d.is_empty()),
        })
    }
}
