//! BatchScheduler: bounded fetch rounds against the work queue.

use std::sync::Arc;

use tracing::info;

use crate::app::executor::BatchExecutor;
use crate::domain::{DrainStop, RunError, RunState, WorkItem};
use crate::ports::WorkQueue;

/// Pulls work in rounds of up to `batch_size` items and hands every
/// non-empty batch to the executor synchronously: round *n* fully
/// completes before round *n+1* is fetched.
///
/// Every pulled item counts against the task cap immediately, so a crash
/// mid-batch still charges those items on retry. The cap bounds dequeue
/// attempts, not confirmed completions, and a round never pulls past the
/// cap.
pub struct BatchScheduler {
    queue: Arc<dyn WorkQueue>,
    queue_name: String,
    batch_size: usize,
    task_cap: u32,
}

impl BatchScheduler {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        queue_name: impl Into<String>,
        batch_size: usize,
        task_cap: u32,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            batch_size,
            task_cap,
        }
    }

    /// Drain until the queue is empty or the cap is reached.
    ///
    /// Both stops are normal terminations; they differ only in logging and
    /// the reported [`DrainStop`].
    pub async fn drain(
        &self,
        state: &mut RunState,
        executor: &mut BatchExecutor,
    ) -> Result<DrainStop, RunError> {
        loop {
            if state.tasks_processed >= self.task_cap {
                info!(processed = state.tasks_processed, "limit reached, stopping for now");
                return Ok(DrainStop::LimitReached);
            }

            let (batch, drained) = self.fetch_round(state).await?;
            if batch.is_empty() {
                info!("no more queue items");
                return Ok(DrainStop::Exhausted);
            }

            info!(count = batch.len(), "processing batch");
            executor.execute(batch).await?;

            // The source ran dry partway through this round; don't fetch
            // another round just to observe the emptiness again.
            if drained {
                info!("no more queue items");
                return Ok(DrainStop::Exhausted);
            }
        }
    }

    /// One fetch round: up to `batch_size` items, clamped to the remaining
    /// cap headroom. Also reports whether the source ran dry mid-round.
    async fn fetch_round(&self, state: &mut RunState) -> Result<(Vec<WorkItem>, bool), RunError> {
        let headroom = (self.task_cap - state.tasks_processed) as usize;
        let width = self.batch_size.min(headroom);

        let mut items = Vec::with_capacity(width);
        let mut drained = false;
        while items.len() < width {
            match self.queue.fetch_next(&self.queue_name).await? {
                Some(item) => {
                    state.tasks_processed += 1;
                    items.push(item);
                }
                None => {
                    drained = true;
                    break;
                }
            }
        }
        Ok((items, drained))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::FailurePolicy;
    use crate::impls::memory_queue::InMemoryQueue;
    use crate::impls::sim::SimApp;
    use crate::ports::{AppControl, Credential};

    const QUEUE: &str = "test-queue";

    async fn seeded(count: usize) -> Arc<InMemoryQueue> {
        let queue = Arc::new(InMemoryQueue::new(QUEUE));
        for i in 0..count {
            queue
                .seed(
                    format!("r{i}"),
                    serde_json::json!({"category": "note", "note": "n"}),
                )
                .await;
        }
        queue
    }

    async fn executor(queue: Arc<InMemoryQueue>, width: usize) -> BatchExecutor {
        let app = SimApp::new();
        let credential = Credential {
            username: "robot".into(),
            password: "hunter2".into(),
        };
        let sessions = app.open_all(&credential, width).await.unwrap();
        BatchExecutor::new(queue, sessions, FailurePolicy::Contain)
    }

    #[tokio::test]
    async fn fourteen_items_take_exactly_three_rounds() {
        let queue = seeded(14).await;
        let scheduler = BatchScheduler::new(queue.clone(), QUEUE, 6, 600);
        let mut exec = executor(queue.clone(), 6).await;
        let mut state = RunState::default();

        let stop = scheduler.drain(&mut state, &mut exec).await.unwrap();

        assert_eq!(stop, DrainStop::Exhausted);
        assert_eq!(state.tasks_processed, 14);
        // Rounds of 6, 6 and 2: the third round observed the empty source
        // itself, so no fourth round was fetched. 15 = 6 + 6 + (2 + None).
        assert_eq!(queue.fetch_calls().await, 15);
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn cap_stops_the_drain_without_a_second_fetch() {
        let queue = seeded(20).await;
        let scheduler = BatchScheduler::new(queue.clone(), QUEUE, 6, 5);
        let mut exec = executor(queue.clone(), 6).await;
        let mut state = RunState::default();

        let stop = scheduler.drain(&mut state, &mut exec).await.unwrap();

        assert_eq!(stop, DrainStop::LimitReached);
        // The single round was clamped to the cap headroom.
        assert_eq!(state.tasks_processed, 5);
        assert_eq!(queue.fetch_calls().await, 5);
        assert_eq!(queue.pending_len().await, 15);
    }

    #[tokio::test]
    async fn empty_queue_is_exhausted_immediately() {
        let queue = seeded(0).await;
        let scheduler = BatchScheduler::new(queue.clone(), QUEUE, 6, 600);
        let mut exec = executor(queue.clone(), 6).await;
        let mut state = RunState::default();

        let stop = scheduler.drain(&mut state, &mut exec).await.unwrap();

        assert_eq!(stop, DrainStop::Exhausted);
        assert_eq!(state.tasks_processed, 0);
        assert_eq!(queue.fetch_calls().await, 1);
    }

    #[tokio::test]
    async fn exact_multiple_of_width_needs_one_empty_round() {
        let queue = seeded(12).await;
        let scheduler = BatchScheduler::new(queue.clone(), QUEUE, 6, 600);
        let mut exec = executor(queue.clone(), 6).await;
        let mut state = RunState::default();

        let stop = scheduler.drain(&mut state, &mut exec).await.unwrap();

        assert_eq!(stop, DrainStop::Exhausted);
        assert_eq!(state.tasks_processed, 12);
        // 6 + 6 full rounds, then one call observing the empty source.
        assert_eq!(queue.fetch_calls().await, 13);
    }

    #[tokio::test]
    async fn tasks_processed_carries_across_drains() {
        let queue = seeded(8).await;
        let scheduler = BatchScheduler::new(queue.clone(), QUEUE, 3, 5);
        let mut exec = executor(queue.clone(), 3).await;
        let mut state = RunState {
            tasks_processed: 3,
            error_count: 1,
        };

        let stop = scheduler.drain(&mut state, &mut exec).await.unwrap();

        // Only the remaining headroom (2) was pulled.
        assert_eq!(stop, DrainStop::LimitReached);
        assert_eq!(state.tasks_processed, 5);
        assert_eq!(queue.pending_len().await, 6);
    }
}
