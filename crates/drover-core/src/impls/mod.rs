//! Development and test implementations of the ports.

pub mod memory_queue;
pub mod sim;

pub use memory_queue::InMemoryQueue;
pub use sim::{Notification, Phase, RecordingNotifier, SimApp, SimOutcome, SimVault};
