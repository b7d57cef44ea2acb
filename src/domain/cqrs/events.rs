//! Events emitted by the iteration log aggregate.
//!
//! Events represent facts that have happened. They are the single source of
//! truth for the log state, persisted append-only to the event log, which
//! doubles as the durable audit record. Each mutating command emits exactly
//! one event.

use crate::domain::collaborators::IterationOutcome;
use crate::domain::registry::{RefinementSuggestion, ValidationFeedback};
use crate::domain::types::{ActorId, FeedbackId, ProjectId, SuggestionId, TimestampUtc, VersionId};
use crate::domain::version::VersionRecord;
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

/// Events emitted by the iteration log aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    /// Log was created for a project.
    LogCreated {
        project_id: ProjectId,
        actor: ActorId,
        created_at: TimestampUtc,
    },

    /// A new draft version was created and became current.
    /// The record carries the feedback/suggestion ids it claims.
    VersionCreated {
        version: VersionRecord,
        actor: ActorId,
    },

    /// An iteration run started; the version is now `in_progress`.
    IterationStarted {
        version_id: VersionId,
        actor: ActorId,
        started_at: TimestampUtc,
    },

    /// The executor finished successfully; terminal fields are frozen.
    IterationCompleted {
        version_id: VersionId,
        outcome: IterationOutcome,
        completed_at: TimestampUtc,
    },

    /// The executor rejected; the version is `failed` and may be retried.
    IterationFailed {
        version_id: VersionId,
        reason: String,
        failed_at: TimestampUtc,
    },

    /// The caller cancelled an outstanding run; the version is `failed`.
    IterationCancelled {
        version_id: VersionId,
        reason: String,
        actor: ActorId,
        cancelled_at: TimestampUtc,
    },

    /// The current pointer moved back to an earlier completed version.
    LogReverted {
        from_version_id: VersionId,
        to_version_id: VersionId,
        actor: ActorId,
        reverted_at: TimestampUtc,
    },

    /// A validation finding was registered.
    FeedbackRegistered {
        feedback: ValidationFeedback,
        actor: ActorId,
    },

    /// Claimed feedback was released by its still-draft version.
    FeedbackUnclaimed {
        feedback_id: FeedbackId,
        version_id: VersionId,
        actor: ActorId,
        unclaimed_at: TimestampUtc,
    },

    /// Generator output was appended to the suggestion registry.
    SuggestionsProposed {
        suggestions: Vec<RefinementSuggestion>,
        proposed_at: TimestampUtc,
    },

    /// A suggestion was accepted.
    SuggestionAccepted {
        suggestion_id: SuggestionId,
        actor: ActorId,
        resolved_at: TimestampUtc,
    },

    /// A suggestion was dismissed.
    SuggestionDismissed {
        suggestion_id: SuggestionId,
        actor: ActorId,
        resolved_at: TimestampUtc,
    },
}

impl DomainEvent for LogEvent {
    fn event_type(&self) -> String {
        match self {
            Self::LogCreated { .. } => "LogCreated".to_string(),
            Self::VersionCreated { .. } => "VersionCreated".to_string(),
            Self::IterationStarted { .. } => "IterationStarted".to_string(),
            Self::IterationCompleted { .. } => "IterationCompleted".to_string(),
            Self::IterationFailed { .. } => "IterationFailed".to_string(),
            Self::IterationCancelled { .. } => "IterationCancelled".to_string(),
            Self::LogReverted { .. } => "LogReverted".to_string(),
            Self::FeedbackRegistered { .. } => "FeedbackRegistered".to_string(),
            Self::FeedbackUnclaimed { .. } => "FeedbackUnclaimed".to_string(),
            Self::SuggestionsProposed { .. } => "SuggestionsProposed".to_string(),
            Self::SuggestionAccepted { .. } => "SuggestionAccepted".to_string(),
            Self::SuggestionDismissed { .. } => "SuggestionDismissed".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1".to_string()
    }
}
