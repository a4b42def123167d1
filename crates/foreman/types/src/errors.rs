//! Error types for the supervision engine
//!
//! Missing configuration is NOT represented here: resolving against an
//! empty configuration yields the unresolved outcome, tier "none".

use crate::ids::{AssignmentId, ProcessId, WorkItemId};

/// Errors that can occur in supervision operations
#[derive(Debug, thiserror::Error)]
pub enum ForemanError {
    #[error("Assignment not found: {0}")]
    AssignmentNotFound(AssignmentId),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Open assignment already exists for {work_item}/{process}")]
    DuplicateOpenAssignment {
        work_item: WorkItemId,
        process: ProcessId,
    },

    #[error("Override rejected: {0}")]
    OverrideInvalid(String),

    #[error(
        "Concurrent modification on assignment {assignment}: expected seq {expected}, ledger at {actual}"
    )]
    ConcurrentModification {
        assignment: AssignmentId,
        expected: u64,
        actual: u64,
    },

    #[error("Ledger append failed: {0}")]
    LedgerAppend(String),

    #[error("Configuration store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type alias for supervision operations
pub type ForemanResult<T> = Result<T, ForemanError>;
