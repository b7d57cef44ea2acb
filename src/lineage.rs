//! High-level handle for one iteration log.
//!
//! `LineageLog` spawns the log actor under a supervisor and exposes the
//! operation surface:
//! version creation, iteration runs, reverts, feedback and suggestion
//! management, and audit queries. It is cheap to clone; all clones talk
//! to the same actor, so mutations stay serialized.

use crate::domain::actor::{actor_name, create_actor_args, LogMessage};
use crate::domain::audit::AuditEntry;
use crate::domain::collaborators::{
    ExportFormat, IterationExecutor, LogExporter, SuggestionGenerator,
};
use crate::domain::errors::LogError;
use crate::domain::registry::{RefinementSuggestion, ValidationFeedback};
use crate::domain::types::{ActorId, FeedbackId, LogId, ProjectId, Severity, SuggestionId, VersionId};
use crate::domain::version::{VersionDraft, VersionRecord};
use crate::domain::supervisor::{LogSupervisor, SupervisorMsg};
use crate::domain::view::{IterationLogView, LogEventEnvelope};
use crate::domain::LogCommand;
use ractor::{Actor, ActorRef};
use std::path::Path;
use tokio::sync::{broadcast, oneshot, watch};

/// Handle to a running iteration log actor.
#[derive(Clone)]
pub struct LineageLog {
    supervisor: ActorRef<SupervisorMsg>,
    actor_name: String,
    log_id: LogId,
}

/// Channels returned when opening a log: the latest view snapshot and the
/// live event stream.
pub struct LogSubscription {
    pub snapshot_rx: watch::Receiver<IterationLogView>,
    pub event_rx: broadcast::Receiver<LogEventEnvelope>,
}

impl LineageLog {
    /// Spawns the actor for a log stored under `base_dir`, supervised so a
    /// crashed actor is respawned from the persisted event stream.
    ///
    /// Reopening an existing log replays its event stream first, so the
    /// handle resumes exactly where the last session left off.
    pub async fn open(base_dir: &Path, log_id: LogId) -> anyhow::Result<(Self, LogSubscription)> {
        let aggregate_id = log_id.to_string();
        let (args, snapshot_rx, event_rx) = create_actor_args(&aggregate_id, base_dir)?;

        let (supervisor, _handle) = LogSupervisor::spawn(None, LogSupervisor, ())
            .await
            .map_err(|e| anyhow::anyhow!("failed to spawn log supervisor: {}", e))?;

        let (tx, rx) = oneshot::channel();
        supervisor
            .send_message(SupervisorMsg::Spawn(args, tx))
            .map_err(|e| anyhow::anyhow!("log supervisor unavailable: {}", e))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("log supervisor dropped the spawn reply"))?
            .map_err(|e| anyhow::anyhow!("failed to spawn log actor: {}", e))?;

        Ok((
            Self {
                supervisor,
                actor_name: actor_name(&aggregate_id),
                log_id,
            },
            LogSubscription {
                snapshot_rx,
                event_rx,
            },
        ))
    }

    /// Returns the log's id.
    pub fn log_id(&self) -> LogId {
        self.log_id
    }

    /// Resolves the supervised actor through the registry, so the handle
    /// keeps working across a respawn.
    fn actor(&self) -> Result<ActorRef<LogMessage>, LogError> {
        ractor::registry::where_is(self.actor_name.clone())
            .map(ActorRef::from)
            .ok_or_else(|| LogError::StorageFailure {
                message: format!("log actor '{}' is not running", self.actor_name),
            })
    }

    async fn execute(&self, command: LogCommand) -> Result<IterationLogView, LogError> {
        let (tx, rx) = oneshot::channel();
        self.actor()?
            .send_message(LogMessage::Command(Box::new(command), tx))
            .map_err(|e| LogError::StorageFailure {
                message: format!("log actor unavailable: {}", e),
            })?;
        rx.await.map_err(|_| LogError::StorageFailure {
            message: "log actor dropped the reply channel".to_string(),
        })?
    }

    /// Initializes the log for a project. Must be the first operation on a
    /// fresh log.
    pub async fn create_log(
        &self,
        project_id: ProjectId,
        actor: ActorId,
    ) -> Result<IterationLogView, LogError> {
        self.execute(LogCommand::CreateLog { project_id, actor }).await
    }

    /// Creates a new draft version, claiming the selected feedback and
    /// suggestions. Returns the created record.
    pub async fn create_version(
        &self,
        draft: VersionDraft,
        actor: ActorId,
    ) -> Result<VersionRecord, LogError> {
        let view = self.execute(LogCommand::CreateVersion { draft, actor }).await?;
        view.versions()
            .last()
            .cloned()
            .ok_or_else(|| LogError::StorageFailure {
                message: "version missing from view after creation".to_string(),
            })
    }

    /// Runs one iteration for a version: marks it in progress, invokes the
    /// executor, and records the outcome.
    ///
    /// Executor failures are absorbed into the record: the version ends up
    /// `failed` with the error as its reason, and this still returns `Ok`.
    /// An outcome carrying metrics outside [0, 100] is treated the same way.
    /// Only precondition violations (unknown version, run already
    /// outstanding) surface as errors.
    pub async fn run_iteration(
        &self,
        version_id: VersionId,
        executor: &dyn IterationExecutor,
        actor: ActorId,
    ) -> Result<VersionRecord, LogError> {
        let view = self
            .execute(LogCommand::StartIteration { version_id, actor })
            .await?;

        let running = view
            .version(version_id)
            .cloned()
            .ok_or_else(|| LogError::InvalidReference {
                message: format!("unknown version id {}", version_id),
            })?;

        let view = match executor.run_iteration(&running).await {
            // An executor returning nonsense metrics must not strand the
            // version in progress; the attempt lands as a failed run.
            Ok(outcome) if !outcome.metrics.in_range() => {
                tracing::warn!(
                    "iteration run for version {} returned metrics outside [0, 100]",
                    version_id
                );
                self.execute(LogCommand::FailIteration {
                    version_id,
                    reason: "executor returned metrics outside [0, 100]".to_string(),
                })
                .await?
            }
            Ok(outcome) => {
                self.execute(LogCommand::CompleteIteration {
                    version_id,
                    outcome,
                })
                .await?
            }
            Err(e) => {
                tracing::warn!("iteration run for version {} failed: {:#}", version_id, e);
                self.execute(LogCommand::FailIteration {
                    version_id,
                    reason: format!("{:#}", e),
                })
                .await?
            }
        };

        view.version(version_id)
            .cloned()
            .ok_or_else(|| LogError::StorageFailure {
                message: "version missing from view after run".to_string(),
            })
    }

    /// Cancels an outstanding run. The version is marked failed with the
    /// given reason.
    pub async fn cancel_iteration(
        &self,
        version_id: VersionId,
        reason: String,
        actor: ActorId,
    ) -> Result<IterationLogView, LogError> {
        self.execute(LogCommand::CancelIteration {
            version_id,
            reason,
            actor,
        })
        .await
    }

    /// Moves the current pointer back to a completed version. The version
    /// that was current becomes `reverted`; no records are deleted.
    pub async fn revert_to_version(
        &self,
        target_version_id: VersionId,
        actor: ActorId,
    ) -> Result<IterationLogView, LogError> {
        self.execute(LogCommand::RevertToVersion {
            target_version_id,
            actor,
        })
        .await
    }

    /// Registers a new validation feedback item and returns it.
    pub async fn register_feedback(
        &self,
        severity: Severity,
        message: String,
        source: Option<String>,
        actor: ActorId,
    ) -> Result<ValidationFeedback, LogError> {
        let view = self
            .execute(LogCommand::RegisterFeedback {
                severity,
                message,
                source,
                actor,
            })
            .await?;
        view.feedback()
            .items()
            .last()
            .cloned()
            .ok_or_else(|| LogError::StorageFailure {
                message: "feedback missing from view after registration".to_string(),
            })
    }

    /// Releases a feedback claim while the claiming version is still a draft.
    pub async fn unclaim_feedback(
        &self,
        feedback_id: FeedbackId,
        actor: ActorId,
    ) -> Result<IterationLogView, LogError> {
        self.execute(LogCommand::UnclaimFeedback { feedback_id, actor })
            .await
    }

    /// Asks the generator for refinement suggestions over the currently
    /// unaddressed feedback and records them. Returns the new suggestions.
    pub async fn generate_suggestions(
        &self,
        generator: &dyn SuggestionGenerator,
    ) -> Result<Vec<RefinementSuggestion>, LogError> {
        let view = self.view().await?;
        let unaddressed: Vec<ValidationFeedback> = view
            .feedback()
            .unaddressed()
            .into_iter()
            .cloned()
            .collect();
        let before = view.suggestions().len();

        let seeds = generator
            .generate(&unaddressed)
            .await
            .map_err(|e| LogError::StorageFailure {
                message: format!("suggestion generator failed: {:#}", e),
            })?;

        let view = self.execute(LogCommand::RecordSuggestions { seeds }).await?;
        Ok(view.suggestions().items()[before..].to_vec())
    }

    /// Accepts a suggestion. Repeating the accept is a no-op; accepting a
    /// dismissed suggestion is rejected.
    pub async fn accept_suggestion(
        &self,
        suggestion_id: SuggestionId,
        actor: ActorId,
    ) -> Result<IterationLogView, LogError> {
        self.execute(LogCommand::AcceptSuggestion {
            suggestion_id,
            actor,
        })
        .await
    }

    /// Dismisses a suggestion. Repeating the dismissal is a no-op;
    /// dismissing an accepted suggestion is rejected.
    pub async fn dismiss_suggestion(
        &self,
        suggestion_id: SuggestionId,
        actor: ActorId,
    ) -> Result<IterationLogView, LogError> {
        self.execute(LogCommand::DismissSuggestion {
            suggestion_id,
            actor,
        })
        .await
    }

    /// Exports the current view through the given exporter.
    pub async fn export(
        &self,
        format: ExportFormat,
        exporter: &dyn LogExporter,
    ) -> Result<(), LogError> {
        let view = self.view().await?;
        exporter
            .export(&view, format)
            .await
            .map_err(|e| LogError::StorageFailure {
                message: format!("export failed: {:#}", e),
            })
    }

    /// Returns the current view snapshot.
    pub async fn view(&self) -> Result<IterationLogView, LogError> {
        let (tx, rx) = oneshot::channel();
        self.actor()?
            .send_message(LogMessage::GetView(tx))
            .map_err(|e| LogError::StorageFailure {
                message: format!("log actor unavailable: {}", e),
            })?;
        rx.await.map_err(|_| LogError::StorageFailure {
            message: "log actor dropped the reply channel".to_string(),
        })
    }

    /// Returns the audit trail, oldest entry first.
    pub async fn audit_trail(&self) -> Result<Vec<AuditEntry>, LogError> {
        let (tx, rx) = oneshot::channel();
        self.actor()?
            .send_message(LogMessage::GetAudit(tx))
            .map_err(|e| LogError::StorageFailure {
                message: format!("log actor unavailable: {}", e),
            })?;
        rx.await.map_err(|_| LogError::StorageFailure {
            message: "log actor dropped the reply channel".to_string(),
        })
    }

    /// Stops the supervised actor and its supervisor.
    pub fn shutdown(&self) {
        let _ = self.supervisor.send_message(SupervisorMsg::Shutdown);
    }
}

#[cfg(test)]
#[path = "tests/lineage_tests.rs"]
mod tests;
