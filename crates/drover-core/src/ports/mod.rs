//! Ports: trait seams to the external collaborators.
//!
//! Everything outside the run-control core lives behind one of these
//! traits: the queue service, the automated application, the
//! credential/constant vault and the failure notifier. The `impls` module
//! ships in-memory versions of each for development and tests.

pub mod control;
pub mod notifier;
pub mod queue;
pub mod vault;

pub use control::{AppControl, Session};
pub use notifier::{Notifier, NotifyError};
pub use queue::WorkQueue;
pub use vault::{Credential, Vault};
