//! Application logic: the run-control state machine.
//!
//! Control flow: [`RunController`] drives up to `max_retry_count` attempts;
//! each attempt resets the environment ([`ResetLifecycle`]), then drains
//! the queue in bounded rounds ([`BatchScheduler`]) that are executed
//! concurrently ([`BatchExecutor`]). Errors escaping an attempt are
//! classified at the controller: business errors abort the run, anything
//! else spends retry budget.

pub mod batch;
pub mod config;
pub mod controller;
pub mod executor;
pub mod reset;

pub use batch::BatchScheduler;
pub use config::{FailurePolicy, RunConfig};
pub use controller::RunController;
pub use executor::BatchExecutor;
pub use reset::ResetLifecycle;
