//! drover-core
//!
//! Core building blocks for the drover batch-automation controller: drain
//! a work queue in bounded batches, fan each batch out to a small pool of
//! concurrent workers driving an external application, and wrap the whole
//! run in a bounded-retry, fail-safe envelope.
//!
//! # Module map
//! - **domain**: work items, error taxonomy, run state and outcomes
//! - **ports**: trait seams to the external collaborators (WorkQueue,
//!   AppControl/Session, Vault, Notifier)
//! - **app**: the run-control state machine (RunController,
//!   BatchScheduler, BatchExecutor, ResetLifecycle, RunConfig)
//! - **impls**: in-memory/simulated implementations for development and
//!   tests (InMemoryQueue, SimApp, SimVault, RecordingNotifier)

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
