//! Audit trail projection.
//!
//! Every applied event yields exactly one audit entry. Commands rejected
//! during validation never reach the event stream, so they leave no trace
//! here. Entry ids are deterministic (`{aggregate_id}:{sequence}`) so
//! replaying the same stream always produces the same trail.

use crate::domain::cqrs::IterationLogAggregate;
use crate::domain::types::{ActorId, TimestampUtc};
use crate::domain::LogEvent;
use async_trait::async_trait;
use cqrs_es::Query;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The kind of state change an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LogCreated,
    VersionCreated,
    IterationStarted,
    IterationCompleted,
    IterationFailed,
    IterationCancelled,
    LogReverted,
    FeedbackRegistered,
    FeedbackUnclaimed,
    SuggestionsProposed,
    SuggestionAccepted,
    SuggestionDismissed,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuditAction::LogCreated => "log_created",
            AuditAction::VersionCreated => "version_created",
            AuditAction::IterationStarted => "iteration_started",
            AuditAction::IterationCompleted => "iteration_completed",
            AuditAction::IterationFailed => "iteration_failed",
            AuditAction::IterationCancelled => "iteration_cancelled",
            AuditAction::LogReverted => "log_reverted",
            AuditAction::FeedbackRegistered => "feedback_registered",
            AuditAction::FeedbackUnclaimed => "feedback_unclaimed",
            AuditAction::SuggestionsProposed => "suggestions_proposed",
            AuditAction::SuggestionAccepted => "suggestion_accepted",
            AuditAction::SuggestionDismissed => "suggestion_dismissed",
        };
        write!(f, "{}", label)
    }
}

/// A single immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: AuditAction,
    pub timestamp: TimestampUtc,
    /// Absent for changes the system applied on its own (executor outcomes).
    pub actor: Option<ActorId>,
    pub description: String,
    pub metadata: HashMap<String, String>,
    pub sequence: u64,
}

impl AuditEntry {
    /// Builds the audit entry for an applied event.
    pub fn from_event(aggregate_id: &str, event: &LogEvent, sequence: u64) -> Self {
        let id = format!("{}:{}", aggregate_id, sequence);
        let mut metadata = HashMap::new();

        let (action, timestamp, actor, description) = match event {
            LogEvent::LogCreated {
                project_id,
                actor,
                created_at,
            } => {
                metadata.insert("project_id".to_string(), project_id.to_string());
                (
                    AuditAction::LogCreated,
                    *created_at,
                    Some(actor.clone()),
                    format!("iteration log created for project '{}'", project_id),
                )
            }
            LogEvent::VersionCreated { version, actor } => {
                metadata.insert("version_id".to_string(), version.id.to_string());
                metadata.insert(
                    "version_number".to_string(),
                    version.version_number.to_string(),
                );
                (
                    AuditAction::VersionCreated,
                    version.created_at,
                    Some(actor.clone()),
                    format!("version {} '{}' created", version.version_number, version.name),
                )
            }
            LogEvent::IterationStarted {
                version_id,
                actor,
                started_at,
            } => {
                metadata.insert("version_id".to_string(), version_id.to_string());
                (
                    AuditAction::IterationStarted,
                    *started_at,
                    Some(actor.clone()),
                    format!("iteration run started for version {}", version_id),
                )
            }
            LogEvent::IterationCompleted {
                version_id,
                outcome,
                completed_at,
            } => {
                metadata.insert("version_id".to_string(), version_id.to_string());
                metadata.insert(
                    "cost".to_string(),
                    format!("{:.6}", outcome.cost.total_cost),
                );
                (
                    AuditAction::IterationCompleted,
                    *completed_at,
                    None,
                    format!("iteration run completed for version {}", version_id),
                )
            }
            LogEvent::IterationFailed {
                version_id,
                reason,
                failed_at,
            } => {
                metadata.insert("version_id".to_string(), version_id.to_string());
                metadata.insert("reason".to_string(), reason.clone());
                (
                    AuditAction::IterationFailed,
                    *failed_at,
                    None,
                    format!("iteration run failed for version {}: {}", version_id, reason),
                )
            }
            LogEvent::IterationCancelled {
                version_id,
                reason,
                actor,
                cancelled_at,
            } => {
                metadata.insert("version_id".to_string(), version_id.to_string());
                metadata.insert("reason".to_string(), reason.clone());
                (
                    AuditAction::IterationCancelled,
                    *cancelled_at,
                    Some(actor.clone()),
                    format!("iteration run cancelled for version {}", version_id),
                )
            }
            LogEvent::LogReverted {
                from_version_id,
                to_version_id,
                actor,
                reverted_at,
            } => {
                metadata.insert("from_version_id".to_string(), from_version_id.to_string());
                metadata.insert("to_version_id".to_string(), to_version_id.to_string());
                (
                    AuditAction::LogReverted,
                    *reverted_at,
                    Some(actor.clone()),
                    format!("reverted from version {} to {}", from_version_id, to_version_id),
                )
            }
            LogEvent::FeedbackRegistered { feedback, actor } => {
                metadata.insert("feedback_id".to_string(), feedback.id.to_string());
                metadata.insert("severity".to_string(), feedback.severity.to_string());
                (
                    AuditAction::FeedbackRegistered,
                    feedback.created_at,
                    Some(actor.clone()),
                    format!("{} feedback registered", feedback.severity),
                )
            }
            LogEvent::FeedbackUnclaimed {
                feedback_id,
                version_id,
                actor,
                unclaimed_at,
            } => {
                metadata.insert("feedback_id".to_string(), feedback_id.to_string());
                metadata.insert("version_id".to_string(), version_id.to_string());
                (
                    AuditAction::FeedbackUnclaimed,
                    *unclaimed_at,
                    Some(actor.clone()),
                    format!("feedback {} released from version {}", feedback_id, version_id),
                )
            }
            LogEvent::SuggestionsProposed {
                suggestions,
                proposed_at,
            } => {
                metadata.insert("count".to_string(), suggestions.len().to_string());
                (
                    AuditAction::SuggestionsProposed,
                    *proposed_at,
                    None,
                    format!("{} refinement suggestion(s) proposed", suggestions.len()),
                )
            }
            LogEvent::SuggestionAccepted {
                suggestion_id,
                actor,
                resolved_at,
            } => {
                metadata.insert("suggestion_id".to_string(), suggestion_id.to_string());
                (
                    AuditAction::SuggestionAccepted,
                    *resolved_at,
                    Some(actor.clone()),
                    format!("suggestion {} accepted", suggestion_id),
                )
            }
            LogEvent::SuggestionDismissed {
                suggestion_id,
                actor,
                resolved_at,
            } => {
                metadata.insert("suggestion_id".to_string(), suggestion_id.to_string());
                (
                    AuditAction::SuggestionDismissed,
                    *resolved_at,
                    Some(actor.clone()),
                    format!("suggestion {} dismissed", suggestion_id),
                )
            }
        };

        Self {
            id,
            action,
            timestamp,
            actor,
            description,
            metadata,
            sequence,
        }
    }
}

/// Append-only audit trail derived from the event stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// Applies one event, appending its audit entry.
    pub fn apply_event(&mut self, aggregate_id: &str, event: &LogEvent, sequence: u64) {
        self.entries
            .push(AuditEntry::from_event(aggregate_id, event, sequence));
    }

    /// Returns all entries oldest-first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// CQRS query handler that maintains the AuditTrail projection.
pub struct AuditQuery {
    pub trail: Arc<RwLock<AuditTrail>>,
}

impl AuditQuery {
    pub fn new(trail: Arc<RwLock<AuditTrail>>) -> Self {
        Self { trail }
    }
}

#[async_trait]
impl Query<IterationLogAggregate> for AuditQuery {
    async fn dispatch(
        &self,
        aggregate_id: &str,
        events: &[cqrs_es::EventEnvelope<IterationLogAggregate>],
    ) {
        let mut trail = self.trail.write().await;
        for event in events {
            trail.apply_event(aggregate_id, &event.payload, event.sequence as u64);
        }
    }
}

#[cfg(test)]
#[path = "tests/audit_tests.rs"]
mod tests;
