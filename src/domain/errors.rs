//! Error types for the iteration log domain.

use crate::domain::types::VersionId;
use std::fmt::{Display, Formatter};

/// Errors that can occur during log command handling.
///
/// Every variant except `StorageFailure` and `ConcurrencyConflict` is a
/// precondition violation: the command is rejected synchronously, the log is
/// unchanged and no audit entry is appended.
#[derive(Debug, Clone)]
pub enum LogError {
    /// Command executed on an uninitialized log.
    NotInitialized,
    /// Unknown or misused feedback/suggestion/version id.
    InvalidReference { message: String },
    /// Operation attempted from a disallowed status.
    InvalidState { message: String },
    /// Revert target does not exist or is not eligible.
    InvalidTarget { message: String },
    /// A run is already outstanding for this version.
    AlreadyRunning { version_id: VersionId },
    /// Suggestion was already resolved with the opposite outcome.
    AlreadyResolved { message: String },
    /// Optimistic lock failure (concurrent modification detected).
    ConcurrencyConflict { message: String },
    /// Storage/persistence failure.
    StorageFailure { message: String },
}

impl Display for LogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "iteration log not initialized"),
            Self::InvalidReference { message } => write!(f, "invalid reference: {}", message),
            Self::InvalidState { message } => write!(f, "invalid state: {}", message),
            Self::InvalidTarget { message } => write!(f, "invalid revert target: {}", message),
            Self::AlreadyRunning { version_id } => {
                write!(f, "iteration already running for version {}", version_id)
            }
            Self::AlreadyResolved { message } => write!(f, "already resolved: {}", message),
            Self::ConcurrencyConflict { message } => write!(f, "concurrency conflict: {}", message),
            Self::StorageFailure { message } => write!(f, "storage failure: {}", message),
        }
    }
}

impl std::error::Error for LogError {}
