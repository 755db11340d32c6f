//! Error types for RosterForge

use chrono::NaiveDate;
use thiserror::Error;

use crate::roster::WorkerId;

/// Main error type for schedule operations.
///
/// Strategy code treats these as "skip this candidate": a failed attempt is
/// logged and the search moves on, it never aborts a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RosterError {
    /// A hard scheduling rule would be broken by the mutation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The worker id is not part of the roster.
    #[error("Worker not found: {0}")]
    WorkerNotFound(WorkerId),

    /// A shift transfer was rejected by the tolerance rules.
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Slot coordinates outside the schedule arena.
    #[error("Slot out of range: day {day}, post {post}")]
    SlotOutOfRange { day: usize, post: usize },

    /// Date outside the scheduling period.
    #[error("Date out of range: {0}")]
    DateOutOfRange(NaiveDate),

    /// Invalid operation for the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A snapshot could not be restored onto the current state.
    #[error("Restore failed: {0}")]
    RestoreFailed(String),
}

/// Result type alias for RosterForge operations
pub type Result<T> = std::result::Result<T, RosterError>;
