//! Error taxonomy.
//!
//! Three kinds of failure exist in this system and they are handled at
//! different boundaries:
//! - [`RunError::Business`]: a broken business rule. Terminal for the whole
//!   run, never retried.
//! - [`RunError::Transient`]: everything else (infrastructure hiccups,
//!   application crashes, unexpected data). Counted against the retry
//!   budget at the outer run boundary.
//! - [`ItemError`]: a failure scoped to one work item, caught at the item
//!   boundary. An [`ItemError::Defect`] (malformed queued data) is
//!   deterministic and never spends retry budget; whether an
//!   [`ItemError::Operation`] failure also fails the attempt is a policy
//!   choice (`FailurePolicy`).

use thiserror::Error;

/// A run-level failure, tagged by classification so the controller can
/// branch with a plain `match` instead of catch ordering.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// A precondition or business rule is broken. Retrying cannot help.
    #[error("business rule broken: {0}")]
    Business(String),

    /// Any other failure. Worth another attempt.
    #[error("{0}")]
    Transient(String),
}

impl RunError {
    pub fn business(message: impl Into<String>) -> Self {
        Self::Business(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_business(&self) -> bool {
        matches!(self, Self::Business(_))
    }
}

/// A failure while processing one work item.
///
/// A defect in the queued data is kept apart from a failure of the
/// external operation: the former can never succeed on retry, so only
/// operation failures are eligible for escalation to the attempt.
#[derive(Debug, Clone, Error)]
pub enum ItemError {
    /// The item's payload is malformed. Deterministic and item-scoped.
    #[error("item {reference}: {message}")]
    Defect { reference: String, message: String },

    /// The external operation failed, keeping the classification of the
    /// underlying error.
    #[error("item {reference}: {source}")]
    Operation {
        reference: String,
        #[source]
        source: RunError,
    },
}

impl ItemError {
    pub fn defect(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Defect {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn operation(reference: impl Into<String>, source: RunError) -> Self {
        Self::Operation {
            reference: reference.into(),
            source,
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            Self::Defect { reference, .. } | Self::Operation { reference, .. } => reference,
        }
    }

    /// The business-rule error carried by this failure, if any. Defects
    /// are never business errors.
    pub fn business_source(&self) -> Option<&RunError> {
        match self {
            Self::Operation { source, .. } if source.is_business() => Some(source),
            _ => None,
        }
    }
}

/// The whole run failed: every attempt ended in a transient error.
#[derive(Debug, Clone, Error)]
#[error("the run failed {attempts} times; giving up")]
pub struct FatalRunError {
    pub attempts: u32,
}
