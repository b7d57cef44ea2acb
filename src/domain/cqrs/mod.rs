//! CQRS core types for the iteration log.
//!
//! This module contains the core CQRS types:
//! - **Commands**: Intent to change the log
//! - **Events**: Facts that have happened
//! - **Aggregate**: Command validation and event application
//! - **Query**: Read-side projections

pub mod commands;
pub mod events;
pub mod query;

pub use commands::LogCommand;
pub use events::LogEvent;
pub use query::LogViewQuery;

use crate::domain::collaborators::{IterationOutcome, SuggestionSeed};
use crate::domain::errors::LogError;
use crate::domain::registry::{
    FeedbackRegistry, RefinementSuggestion, SuggestionRegistry, ValidationFeedback,
};
use crate::domain::services::{IdProvider, LogServices};
use crate::domain::types::{
    ActorId, FeedbackId, ProjectId, SuggestionId, TimestampUtc, VersionId, VersionNumber,
    VersionStatus,
};
use crate::domain::version::{VersionDraft, VersionRecord};
use async_trait::async_trait;
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

/// Active log data once the aggregate is initialized.
///
/// Invariants enforced here:
/// - `versions` is append-only; insertion order is creation order.
/// - `current_version_id` always resolves to an entry in `versions` once the
///   first version exists.
/// - `total_cost` always equals the recomputation over `versions`.
/// - no feedback id is claimed by two versions at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationLogData {
    project_id: ProjectId,
    created_at: TimestampUtc,
    versions: Vec<VersionRecord>,
    current_version_id: Option<VersionId>,
    total_cost: f64,
    feedback: FeedbackRegistry,
    suggestions: SuggestionRegistry,
}

impl IterationLogData {
    /// Returns the project this log belongs to.
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Returns the creation timestamp.
    pub fn created_at(&self) -> &TimestampUtc {
        &self.created_at
    }

    /// Returns every version in creation order.
    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    /// Returns the id of the current version, if any version exists.
    pub fn current_version_id(&self) -> Option<VersionId> {
        self.current_version_id
    }

    /// Returns the cached cost rollup.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Returns the feedback registry.
    pub fn feedback(&self) -> &FeedbackRegistry {
        &self.feedback
    }

    /// Returns the suggestion registry.
    pub fn suggestions(&self) -> &SuggestionRegistry {
        &self.suggestions
    }

    /// Looks up a version by id.
    pub fn version(&self, id: VersionId) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.id == id)
    }

    fn version_mut(&mut self, id: VersionId) -> Option<&mut VersionRecord> {
        self.versions.iter_mut().find(|v| v.id == id)
    }

    /// Allocates the next version number: `max(existing) + 1`, never reused.
    fn next_version_number(&self) -> VersionNumber {
        self.versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .map(|n| n.next())
            .unwrap_or_else(VersionNumber::first)
    }

    fn validate_create_version(&self, draft: &VersionDraft) -> Result<(), LogError> {
        let mut seen_feedback: Vec<FeedbackId> = Vec::new();
        for fid in &draft.selected_feedback {
            if seen_feedback.contains(fid) {
                return Err(LogError::InvalidReference {
                    message: format!("duplicate feedback id {}", fid),
                });
            }
            seen_feedback.push(*fid);

            match self.feedback.get(*fid) {
                None => {
                    return Err(LogError::InvalidReference {
                        message: format!("unknown feedback id {}", fid),
                    })
                }
                Some(item) if item.is_addressed => {
                    return Err(LogError::InvalidReference {
                        message: format!(
                            "feedback {} is already addressed by version {}; un-claim it first",
                            fid,
                            item.addressed_in_iteration
                                .map(|v| v.to_string())
                                .unwrap_or_default()
                        ),
                    })
                }
                Some(_) => {}
            }
        }

        let mut seen_suggestions: Vec<SuggestionId> = Vec::new();
        for sid in &draft.selected_suggestions {
            if seen_suggestions.contains(sid) {
                return Err(LogError::InvalidReference {
                    message: format!("duplicate suggestion id {}", sid),
                });
            }
            seen_suggestions.push(*sid);

            match self.suggestions.get(*sid) {
                None => {
                    return Err(LogError::InvalidReference {
                        message: format!("unknown suggestion id {}", sid),
                    })
                }
                Some(s) if s.is_dismissed => {
                    return Err(LogError::InvalidReference {
                        message: format!("suggestion {} was dismissed", sid),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    fn handle_create_version(
        &self,
        draft: VersionDraft,
        actor: ActorId,
        now: TimestampUtc,
        ids: &IdProvider,
    ) -> Result<Vec<LogEvent>, LogError> {
        self.validate_create_version(&draft)?;

        let record = VersionRecord::draft(
            VersionId(ids.next_id()),
            self.next_version_number(),
            self.current_version_id,
            draft,
            actor.clone(),
            now,
        );

        Ok(vec![LogEvent::VersionCreated {
            version: record,
            actor,
        }])
    }

    fn handle_start_iteration(
        &self,
        version_id: VersionId,
        actor: ActorId,
        now: TimestampUtc,
    ) -> Result<Vec<LogEvent>, LogError> {
        let version = self
            .version(version_id)
            .ok_or_else(|| LogError::InvalidReference {
                message: format!("unknown version id {}", version_id),
            })?;

        if version.is_running() {
            return Err(LogError::AlreadyRunning { version_id });
        }
        if !version.status.can_start_run() {
            return Err(LogError::InvalidState {
                message: format!(
                    "cannot start a run for version {} from status '{}'",
                    version.version_number, version.status
                ),
            });
        }

        Ok(vec![LogEvent::IterationStarted {
            version_id,
            actor,
            started_at: now,
        }])
    }

    fn require_running(&self, version_id: VersionId) -> Result<&VersionRecord, LogError> {
        let version = self
            .version(version_id)
            .ok_or_else(|| LogError::InvalidReference {
                message: format!("unknown version id {}", version_id),
            })?;
        if !version.is_running() {
            return Err(LogError::InvalidState {
                message: format!(
                    "version {} has no outstanding run (status '{}')",
                    version.version_number, version.status
                ),
            });
        }
        Ok(version)
    }

    fn handle_complete_iteration(
        &self,
        version_id: VersionId,
        outcome: IterationOutcome,
        now: TimestampUtc,
    ) -> Result<Vec<LogEvent>, LogError> {
        self.require_running(version_id)?;

        if !outcome.metrics.in_range() {
            return Err(LogError::InvalidState {
                message: "iteration metrics must be within [0, 100]".to_string(),
            });
        }

        Ok(vec![LogEvent::IterationCompleted {
            version_id,
            outcome,
            completed_at: now,
        }])
    }

    fn handle_revert(
        &self,
        target_version_id: VersionId,
        actor: ActorId,
        now: TimestampUtc,
    ) -> Result<Vec<LogEvent>, LogError> {
        let target = self
            .version(target_version_id)
            .ok_or_else(|| LogError::InvalidTarget {
                message: format!("unknown version id {}", target_version_id),
            })?;

        let current_id = self.current_version_id.ok_or_else(|| LogError::InvalidTarget {
            message: "log has no versions".to_string(),
        })?;

        if target.id == current_id {
            return Err(LogError::InvalidTarget {
                message: format!("version {} is already current", target.version_number),
            });
        }
        if !target.is_revert_target() {
            return Err(LogError::InvalidTarget {
                message: format!(
                    "version {} has status '{}'; only completed versions are eligible",
                    target.version_number, target.status
                ),
            });
        }

        // A pointer move under an outstanding run would strand the executor
        // reconciliation.
        if self.version(current_id).is_some_and(|v| v.is_running()) {
            return Err(LogError::InvalidState {
                message: "cannot revert while the current version has an outstanding run"
                    .to_string(),
            });
        }

        Ok(vec![LogEvent::LogReverted {
            from_version_id: current_id,
            to_version_id: target_version_id,
            actor,
            reverted_at: now,
        }])
    }

    fn handle_unclaim_feedback(
        &self,
        feedback_id: FeedbackId,
        actor: ActorId,
        now: TimestampUtc,
    ) -> Result<Vec<LogEvent>, LogError> {
        let item = self
            .feedback
            .get(feedback_id)
            .ok_or_else(|| LogError::InvalidReference {
                message: format!("unknown feedback id {}", feedback_id),
            })?;

        let version_id = match item.addressed_in_iteration {
            Some(id) if item.is_addressed => id,
            _ => {
                return Err(LogError::InvalidState {
                    message: format!("feedback {} is not addressed", feedback_id),
                })
            }
        };

        match self.version(version_id) {
            Some(v) if v.status == VersionStatus::Draft => {}
            Some(v) => {
                return Err(LogError::InvalidState {
                    message: format!(
                        "feedback {} is claimed by version {} (status '{}'); claims are frozen",
                        feedback_id, v.version_number, v.status
                    ),
                })
            }
            None => {
                return Err(LogError::InvalidReference {
                    message: format!("feedback {} references a missing version", feedback_id),
                })
            }
        }

        Ok(vec![LogEvent::FeedbackUnclaimed {
            feedback_id,
            version_id,
            actor,
            unclaimed_at: now,
        }])
    }

    fn handle_record_suggestions(
        &self,
        seeds: Vec<SuggestionSeed>,
        now: TimestampUtc,
        ids: &IdProvider,
    ) -> Result<Vec<LogEvent>, LogError> {
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        for seed in &seeds {
            for fid in &seed.related_feedback {
                if self.feedback.get(*fid).is_none() {
                    return Err(LogError::InvalidReference {
                        message: format!("suggestion references unknown feedback id {}", fid),
                    });
                }
            }
        }

        let suggestions = seeds
            .into_iter()
            .map(|seed| RefinementSuggestion {
                id: SuggestionId(ids.next_id()),
                summary: seed.summary,
                rationale: seed.rationale,
                related_feedback: seed.related_feedback,
                is_accepted: false,
                is_dismissed: false,
                created_at: now,
                resolved_at: None,
            })
            .collect();

        Ok(vec![LogEvent::SuggestionsProposed {
            suggestions,
            proposed_at: now,
        }])
    }

    fn handle_resolve_suggestion(
        &self,
        suggestion_id: SuggestionId,
        accept: bool,
        actor: ActorId,
        now: TimestampUtc,
    ) -> Result<Vec<LogEvent>, LogError> {
        let suggestion = self
            .suggestions
            .get(suggestion_id)
            .ok_or_else(|| LogError::InvalidReference {
                message: format!("unknown suggestion id {}", suggestion_id),
            })?;

        // Repeating the same outcome is a no-op; the opposite outcome after
        // resolution is a conflict.
        if suggestion.is_accepted == accept && suggestion.is_dismissed == !accept {
            return Ok(Vec::new());
        }
        if suggestion.is_resolved() {
            let resolved_as = if suggestion.is_accepted {
                "accepted"
            } else {
                "dismissed"
            };
            return Err(LogError::AlreadyResolved {
                message: format!("suggestion {} was already {}", suggestion_id, resolved_as),
            });
        }

        let event = if accept {
            LogEvent::SuggestionAccepted {
                suggestion_id,
                actor,
                resolved_at: now,
            }
        } else {
            LogEvent::SuggestionDismissed {
                suggestion_id,
                actor,
                resolved_at: now,
            }
        };
        Ok(vec![event])
    }

    // ========== Event application ==========

    fn apply_version_created(&mut self, version: VersionRecord) {
        for fid in &version.addressed_feedback {
            if let Some(item) = self.feedback.get_mut(*fid) {
                item.is_addressed = true;
                item.addressed_in_iteration = Some(version.id);
            }
        }
        self.current_version_id = Some(version.id);
        self.versions.push(version);
    }

    fn apply_iteration_started(&mut self, version_id: VersionId) {
        if let Some(version) = self.version_mut(version_id) {
            version.status = VersionStatus::InProgress;
        }
    }

    fn apply_iteration_completed(
        &mut self,
        version_id: VersionId,
        outcome: IterationOutcome,
        completed_at: TimestampUtc,
    ) {
        let added_cost = outcome.cost.total_cost;
        if let Some(version) = self.version_mut(version_id) {
            version.status = VersionStatus::Completed;
            version.metrics = outcome.metrics;
            version.cost = outcome.cost;
            version.changes = outcome.changes;
            version.notes = outcome.notes;
            version.completed_at = Some(completed_at);
            version.failure_reason = None;
            self.total_cost += added_cost;
        }
    }

    fn apply_iteration_failed(&mut self, version_id: VersionId, reason: String) {
        if let Some(version) = self.version_mut(version_id) {
            version.status = VersionStatus::Failed;
            version.failure_reason = Some(reason);
        }
    }

    fn apply_log_reverted(&mut self, from_version_id: VersionId, to_version_id: VersionId) {
        if let Some(version) = self.version_mut(from_version_id) {
            version.status = VersionStatus::Reverted;
        }
        self.current_version_id = Some(to_version_id);
    }

    fn apply_feedback_unclaimed(&mut self, feedback_id: FeedbackId, version_id: VersionId) {
        if let Some(item) = self.feedback.get_mut(feedback_id) {
            item.is_addressed = false;
            item.addressed_in_iteration = None;
        }
        if let Some(version) = self.version_mut(version_id) {
            version.addressed_feedback.retain(|fid| *fid != feedback_id);
        }
    }

    fn apply_suggestion_resolved(&mut self, suggestion_id: SuggestionId, accepted: bool, at: TimestampUtc) {
        if let Some(suggestion) = self.suggestions.get_mut(suggestion_id) {
            if accepted {
                suggestion.is_accepted = true;
            } else {
                suggestion.is_dismissed = true;
            }
            suggestion.resolved_at = Some(at);
        }
    }
}

/// Iteration log aggregate state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum LogState {
    /// Aggregate has not been initialized.
    #[default]
    Uninitialized,
    /// Aggregate is active with log data (boxed for memory efficiency).
    Active(Box<IterationLogData>),
}

/// The iteration log aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IterationLogAggregate {
    pub state: LogState,
}

#[async_trait]
impl Aggregate for IterationLogAggregate {
    type Command = LogCommand;
    type Event = LogEvent;
    type Error = LogError;
    type Services = LogServices;

    fn aggregate_type() -> String {
        "iteration_log".to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        let now = services.clock.now();

        match (&self.state, command) {
            // CreateLog - only valid on an uninitialized aggregate
            (LogState::Uninitialized, LogCommand::CreateLog { project_id, actor }) => {
                Ok(vec![LogEvent::LogCreated {
                    project_id,
                    actor,
                    created_at: now,
                }])
            }
            (LogState::Active(_), LogCommand::CreateLog { .. }) => Err(LogError::InvalidState {
                message: "iteration log is already initialized".to_string(),
            }),

            // Everything else requires an initialized log
            (LogState::Uninitialized, _) => Err(LogError::NotInitialized),

            (LogState::Active(data), LogCommand::CreateVersion { draft, actor }) => {
                data.handle_create_version(draft, actor, now, &services.ids)
            }

            (LogState::Active(data), LogCommand::StartIteration { version_id, actor }) => {
                data.handle_start_iteration(version_id, actor, now)
            }

            (
                LogState::Active(data),
                LogCommand::CompleteIteration {
                    version_id,
                    outcome,
                },
            ) => data.handle_complete_iteration(version_id, outcome, now),

            (LogState::Active(data), LogCommand::FailIteration { version_id, reason }) => {
                data.require_running(version_id)?;
                Ok(vec![LogEvent::IterationFailed {
                    version_id,
                    reason,
                    failed_at: now,
                }])
            }

            (
                LogState::Active(data),
                LogCommand::CancelIteration {
                    version_id,
                    reason,
                    actor,
                },
            ) => {
                data.require_running(version_id)?;
                Ok(vec![LogEvent::IterationCancelled {
                    version_id,
                    reason,
                    actor,
                    cancelled_at: now,
                }])
            }

            (
                LogState::Active(data),
                LogCommand::RevertToVersion {
                    target_version_id,
                    actor,
                },
            ) => data.handle_revert(target_version_id, actor, now),

            (
                LogState::Active(_),
                LogCommand::RegisterFeedback {
                    severity,
                    message,
                    source,
                    actor,
                },
            ) => {
                let feedback = ValidationFeedback::new(
                    FeedbackId(services.ids.next_id()),
                    severity,
                    message,
                    source,
                    now,
                );
                Ok(vec![LogEvent::FeedbackRegistered { feedback, actor }])
            }

            (LogState::Active(data), LogCommand::UnclaimFeedback { feedback_id, actor }) => {
                data.handle_unclaim_feedback(feedback_id, actor, now)
            }

            (LogState::Active(data), LogCommand::RecordSuggestions { seeds }) => {
                data.handle_record_suggestions(seeds, now, &services.ids)
            }

            (
                LogState::Active(data),
                LogCommand::AcceptSuggestion {
                    suggestion_id,
                    actor,
                },
            ) => data.handle_resolve_suggestion(suggestion_id, true, actor, now),

            (
                LogState::Active(data),
                LogCommand::DismissSuggestion {
                    suggestion_id,
                    actor,
                },
            ) => data.handle_resolve_suggestion(suggestion_id, false, actor, now),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match (&mut self.state, event) {
            // LogCreated initializes the aggregate
            (
                LogState::Uninitialized,
                LogEvent::LogCreated {
                    project_id,
                    created_at,
                    ..
                },
            ) => {
                self.state = LogState::Active(Box::new(IterationLogData {
                    project_id,
                    created_at,
                    versions: Vec::new(),
                    current_version_id: None,
                    total_cost: 0.0,
                    feedback: FeedbackRegistry::default(),
                    suggestions: SuggestionRegistry::default(),
                }));
            }

            (LogState::Active(data), LogEvent::VersionCreated { version, .. }) => {
                data.apply_version_created(version);
            }

            (LogState::Active(data), LogEvent::IterationStarted { version_id, .. }) => {
                data.apply_iteration_started(version_id);
            }

            (
                LogState::Active(data),
                LogEvent::IterationCompleted {
                    version_id,
                    outcome,
                    completed_at,
                },
            ) => {
                data.apply_iteration_completed(version_id, outcome, completed_at);
            }

            (
                LogState::Active(data),
                LogEvent::IterationFailed {
                    version_id, reason, ..
                },
            )
            | (
                LogState::Active(data),
                LogEvent::IterationCancelled {
                    version_id, reason, ..
                },
            ) => {
                data.apply_iteration_failed(version_id, reason);
            }

            (
                LogState::Active(data),
                LogEvent::LogReverted {
                    from_version_id,
                    to_version_id,
                    ..
                },
            ) => {
                data.apply_log_reverted(from_version_id, to_version_id);
            }

            (LogState::Active(data), LogEvent::FeedbackRegistered { feedback, .. }) => {
                data.feedback.push(feedback);
            }

            (
                LogState::Active(data),
                LogEvent::FeedbackUnclaimed {
                    feedback_id,
                    version_id,
                    ..
                },
            ) => {
                data.apply_feedback_unclaimed(feedback_id, version_id);
            }

            (LogState::Active(data), LogEvent::SuggestionsProposed { suggestions, .. }) => {
                for suggestion in suggestions {
                    data.suggestions.push(suggestion);
                }
            }

            (
                LogState::Active(data),
                LogEvent::SuggestionAccepted {
                    suggestion_id,
                    resolved_at,
                    ..
                },
            ) => {
                data.apply_suggestion_resolved(suggestion_id, true, resolved_at);
            }

            (
                LogState::Active(data),
                LogEvent::SuggestionDismissed {
                    suggestion_id,
                    resolved_at,
                    ..
                },
            ) => {
                data.apply_suggestion_resolved(suggestion_id, false, resolved_at);
            }

            // Ignore events on wrong state (shouldn't happen with correct event sourcing)
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "../tests/aggregate_tests.rs"]
mod tests;
