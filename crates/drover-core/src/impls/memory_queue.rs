//! In-memory work queue for development and tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{ItemId, ItemStatus, RunError, WorkItem};
use crate::ports::WorkQueue;

struct QueueState {
    pending: VecDeque<WorkItem>,
    terminal: HashMap<ItemId, ItemStatus>,
    fetch_calls: u32,
}

/// A single named FIFO queue held in memory.
///
/// Enforces the one-shot status contract: an item can be marked terminal
/// exactly once, and only with a terminal status.
pub struct InMemoryQueue {
    name: String,
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                terminal: HashMap::new(),
                fetch_calls: 0,
            }),
        }
    }

    /// Append a pending item with a freshly minted id.
    pub async fn seed(&self, reference: impl Into<String>, payload: serde_json::Value) -> ItemId {
        let id = ItemId::new(Ulid::new().to_string());
        let mut state = self.state.lock().await;
        state.pending.push_back(WorkItem {
            id: id.clone(),
            reference: reference.into(),
            payload,
            status: ItemStatus::Pending,
            created_at: Utc::now(),
        });
        id
    }

    /// Terminal statuses recorded so far.
    pub async fn statuses(&self) -> HashMap<ItemId, ItemStatus> {
        self.state.lock().await.terminal.clone()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Number of `fetch_next` calls observed, including ones that
    /// returned nothing.
    pub async fn fetch_calls(&self) -> u32 {
        self.state.lock().await.fetch_calls
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn fetch_next(&self, queue: &str) -> Result<Option<WorkItem>, RunError> {
        let mut state = self.state.lock().await;
        state.fetch_calls += 1;
        if queue != self.name {
            return Ok(None);
        }
        Ok(state.pending.pop_front())
    }

    async fn set_status(&self, id: &ItemId, status: ItemStatus) -> Result<(), RunError> {
        if !status.is_terminal() {
            return Err(RunError::transient(format!(
                "cannot set non-terminal status {status:?} on item {id}"
            )));
        }
        let mut state = self.state.lock().await;
        if state.terminal.contains_key(id) {
            return Err(RunError::transient(format!("item {id} is already terminal")));
        }
        state.terminal.insert(id.clone(), status);
        Ok(())
    }
}
