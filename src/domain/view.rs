//! Iteration log view projection for query and export purposes.
//!
//! The IterationLogView is derived from LogEvent only (no direct mutation)
//! and carries the data needed for lineage queries, cost rollups, and export.

use crate::domain::cqrs::IterationLogAggregate;
use crate::domain::registry::{FeedbackRegistry, SuggestionRegistry};
use crate::domain::rollup;
use crate::domain::types::{LogId, ProjectId, TimestampUtc, VersionId, VersionStatus};
use crate::domain::version::VersionRecord;
use crate::domain::LogEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only view of iteration log state derived from events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationLogView {
    log_id: Option<LogId>,
    project_id: Option<ProjectId>,
    created_at: Option<TimestampUtc>,
    updated_at: Option<TimestampUtc>,
    versions: Vec<VersionRecord>,
    current_version_id: Option<VersionId>,
    total_cost: f64,
    feedback: FeedbackRegistry,
    suggestions: SuggestionRegistry,
    last_event_sequence: u64,
}

impl IterationLogView {
    /// Apply an event to update the view.
    pub fn apply_event(&mut self, aggregate_id: &str, event: &LogEvent, sequence: u64) {
        // Parse aggregate_id as UUID - log warning on invalid format
        match Uuid::parse_str(aggregate_id) {
            Ok(uuid) => self.log_id = Some(LogId(uuid)),
            Err(e) => tracing::warn!("Invalid aggregate ID '{}': {}", aggregate_id, e),
        }
        self.last_event_sequence = sequence;

        match event {
            LogEvent::LogCreated {
                project_id,
                created_at,
                ..
            } => {
                self.project_id = Some(project_id.clone());
                self.created_at = Some(*created_at);
                self.updated_at = Some(*created_at);
                self.versions.clear();
                self.current_version_id = None;
                self.total_cost = 0.0;
                self.feedback = FeedbackRegistry::default();
                self.suggestions = SuggestionRegistry::default();
            }

            LogEvent::VersionCreated { version, .. } => {
                for fid in &version.addressed_feedback {
                    if let Some(item) = self.feedback.get_mut(*fid) {
                        item.is_addressed = true;
                        item.addressed_in_iteration = Some(version.id);
                    }
                }
                self.current_version_id = Some(version.id);
                self.updated_at = Some(version.created_at);
                self.versions.push(version.clone());
            }

            LogEvent::IterationStarted {
                version_id,
                started_at,
                ..
            } => {
                if let Some(v) = self.version_mut(*version_id) {
                    v.status = VersionStatus::InProgress;
                }
                self.updated_at = Some(*started_at);
            }

            LogEvent::IterationCompleted {
                version_id,
                outcome,
                completed_at,
            } => {
                let added_cost = outcome.cost.total_cost;
                if let Some(v) = self.version_mut(*version_id) {
                    v.status = VersionStatus::Completed;
                    v.metrics = outcome.metrics;
                    v.cost = outcome.cost.clone();
                    v.changes = outcome.changes.clone();
                    v.notes = outcome.notes.clone();
                    v.completed_at = Some(*completed_at);
                    v.failure_reason = None;
                    self.total_cost += added_cost;
                }
                self.updated_at = Some(*completed_at);
            }

            LogEvent::IterationFailed {
                version_id,
                reason,
                failed_at,
            } => {
                if let Some(v) = self.version_mut(*version_id) {
                    v.status = VersionStatus::Failed;
                    v.failure_reason = Some(reason.clone());
                }
                self.updated_at = Some(*failed_at);
            }

            LogEvent::IterationCancelled {
                version_id,
                reason,
                cancelled_at,
                ..
            } => {
                if let Some(v) = self.version_mut(*version_id) {
                    v.status = VersionStatus::Failed;
                    v.failure_reason = Some(reason.clone());
                }
                self.updated_at = Some(*cancelled_at);
            }

            LogEvent::LogReverted {
                from_version_id,
                to_version_id,
                reverted_at,
                ..
            } => {
                if let Some(v) = self.version_mut(*from_version_id) {
                    v.status = VersionStatus::Reverted;
                }
                self.current_version_id = Some(*to_version_id);
                self.updated_at = Some(*reverted_at);
            }

            LogEvent::FeedbackRegistered { feedback, .. } => {
                self.updated_at = Some(feedback.created_at);
                self.feedback.push(feedback.clone());
            }

            LogEvent::FeedbackUnclaimed {
                feedback_id,
                version_id,
                unclaimed_at,
                ..
            } => {
                if let Some(item) = self.feedback.get_mut(*feedback_id) {
                    item.is_addressed = false;
                    item.addressed_in_iteration = None;
                }
                if let Some(v) = self.version_mut(*version_id) {
                    v.addressed_feedback.retain(|fid| fid != feedback_id);
                }
                self.updated_at = Some(*unclaimed_at);
            }

            LogEvent::SuggestionsProposed {
                suggestions,
                proposed_at,
            } => {
                for suggestion in suggestions {
                    self.suggestions.push(suggestion.clone());
                }
                self.updated_at = Some(*proposed_at);
            }

            LogEvent::SuggestionAccepted {
                suggestion_id,
                resolved_at,
                ..
            } => {
                if let Some(s) = self.suggestions.get_mut(*suggestion_id) {
                    s.is_accepted = true;
                    s.resolved_at = Some(*resolved_at);
                }
                self.updated_at = Some(*resolved_at);
            }

            LogEvent::SuggestionDismissed {
                suggestion_id,
                resolved_at,
                ..
            } => {
                if let Some(s) = self.suggestions.get_mut(*suggestion_id) {
                    s.is_dismissed = true;
                    s.resolved_at = Some(*resolved_at);
                }
                self.updated_at = Some(*resolved_at);
            }
        }
    }

    fn version_mut(&mut self, id: VersionId) -> Option<&mut VersionRecord> {
        self.versions.iter_mut().find(|v| v.id == id)
    }

    /// Returns the log ID.
    pub fn log_id(&self) -> Option<&LogId> {
        self.log_id.as_ref()
    }

    /// Returns the project this log belongs to.
    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    /// Returns the creation timestamp.
    pub fn created_at(&self) -> Option<&TimestampUtc> {
        self.created_at.as_ref()
    }

    /// Returns the timestamp of the last applied event.
    pub fn updated_at(&self) -> Option<&TimestampUtc> {
        self.updated_at.as_ref()
    }

    /// Returns every version in creation order.
    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    /// Looks up a version by id.
    pub fn version(&self, id: VersionId) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Returns the id of the current version, if any version exists.
    pub fn current_version_id(&self) -> Option<VersionId> {
        self.current_version_id
    }

    /// Returns the current version record.
    pub fn current_version(&self) -> Option<&VersionRecord> {
        self.current_version_id.and_then(|id| self.version(id))
    }

    /// Returns the accumulated cost across all versions.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Returns how many versions the log holds, reverted ones included.
    pub fn total_iterations(&self) -> usize {
        rollup::total_iterations(&self.versions)
    }

    /// Returns the share of feedback that has been addressed, 0-100.
    pub fn addressed_percent(&self) -> f64 {
        rollup::addressed_percent(self.feedback.items())
    }

    /// Returns the feedback registry.
    pub fn feedback(&self) -> &FeedbackRegistry {
        &self.feedback
    }

    /// Returns the suggestion registry.
    pub fn suggestions(&self) -> &SuggestionRegistry {
        &self.suggestions
    }

    /// Returns the last event sequence number.
    pub fn last_event_sequence(&self) -> u64 {
        self.last_event_sequence
    }
}

/// Serializable wrapper for event envelopes used in broadcasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEventEnvelope {
    pub aggregate_id: String,
    pub sequence: u64,
    pub event: LogEvent,
}

impl From<&cqrs_es::EventEnvelope<IterationLogAggregate>> for LogEventEnvelope {
    fn from(source: &cqrs_es::EventEnvelope<IterationLogAggregate>) -> Self {
        Self {
            aggregate_id: source.aggregate_id.clone(),
            sequence: source.sequence as u64,
            event: source.payload.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
