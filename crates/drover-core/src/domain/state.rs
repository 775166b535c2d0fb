//! Run state and outcomes.

/// Counters owned by the run controller and carried across attempts.
///
/// `tasks_processed` counts dequeue attempts, not completions: it moves at
/// fetch time, never decreases, and never exceeds the configured task cap.
/// `error_count` counts attempts that ended in a transient error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    pub tasks_processed: u32,
    pub error_count: u32,
}

/// Why the inner drain loop stopped. Both are normal terminations; they
/// differ only in what gets logged and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStop {
    /// The queue returned no more items.
    Exhausted,
    /// The per-run task cap was reached.
    LimitReached,
}

/// How a run ended, short of exhausting the retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    /// The drain loop ran to a normal stop.
    Completed(DrainStop),
    /// A business rule was broken; the run stopped without spending the
    /// remaining retry budget.
    BusinessAborted(String),
}

/// Summary handed back to the caller after the final teardown.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub verdict: RunVerdict,
    pub tasks_processed: u32,
    pub transient_errors: u32,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.verdict, RunVerdict::Completed(_))
    }
}
