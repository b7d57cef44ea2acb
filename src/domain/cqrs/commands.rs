//! Commands for the iteration log aggregate.
//!
//! Commands express intent to change the log. The aggregate validates every
//! invariant before emitting events; a rejected command leaves the log
//! untouched and produces no audit entry.

use crate::domain::collaborators::{IterationOutcome, SuggestionSeed};
use crate::domain::types::{ActorId, FeedbackId, ProjectId, Severity, SuggestionId, VersionId};
use crate::domain::version::VersionDraft;
use serde::{Deserialize, Serialize};

/// Commands accepted by the iteration log aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogCommand {
    /// Initialize the log for a project. Valid only on an uninitialized log.
    CreateLog { project_id: ProjectId, actor: ActorId },

    /// Create a new draft version branching from the current version.
    CreateVersion { draft: VersionDraft, actor: ActorId },

    /// Mark a version `in_progress` before the executor is invoked.
    StartIteration { version_id: VersionId, actor: ActorId },

    /// Reconcile a successful executor result into the version.
    CompleteIteration {
        version_id: VersionId,
        outcome: IterationOutcome,
    },

    /// Reconcile an executor failure into the version.
    FailIteration { version_id: VersionId, reason: String },

    /// Explicitly cancel an outstanding run.
    CancelIteration {
        version_id: VersionId,
        reason: String,
        actor: ActorId,
    },

    /// Move the current pointer back to a completed version.
    RevertToVersion {
        target_version_id: VersionId,
        actor: ActorId,
    },

    /// Register a reviewer/validation finding.
    RegisterFeedback {
        severity: Severity,
        message: String,
        source: Option<String>,
        actor: ActorId,
    },

    /// Release feedback claimed by a still-draft version so it can be
    /// re-selected elsewhere.
    UnclaimFeedback {
        feedback_id: FeedbackId,
        actor: ActorId,
    },

    /// Record generator output in the suggestion registry.
    RecordSuggestions { seeds: Vec<SuggestionSeed> },

    /// Accept a suggestion. Idempotent on repeat.
    AcceptSuggestion {
        suggestion_id: SuggestionId,
        actor: ActorId,
    },

    /// Dismiss a suggestion. Idempotent on repeat.
    DismissSuggestion {
        suggestion_id: SuggestionId,
        actor: ActorId,
    },
}
