//! Iteration log actor for CQRS command handling.
//!
//! The LogActor wraps the CQRS framework and provides a message-based
//! interface for executing commands and querying state. All commands for
//! one log pass through a single actor, so mutations are serialized.

use crate::domain::audit::{AuditEntry, AuditQuery, AuditTrail};
use crate::domain::cqrs::IterationLogAggregate;
use crate::domain::errors::LogError;
use crate::domain::services::LogServices;
use crate::domain::view::{IterationLogView, LogEventEnvelope};
use crate::domain::LogCommand;
use crate::domain::LogViewQuery;
use crate::event_store::{FileEventStore, StoredEvent};
use async_trait::async_trait;
use cqrs_es::{AggregateError, CqrsFramework};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch, RwLock};

/// Messages that can be sent to the log actor.
pub enum LogMessage {
    /// Execute a command and return the updated view (or error).
    Command(
        Box<LogCommand>,
        oneshot::Sender<Result<IterationLogView, LogError>>,
    ),
    /// Get the current view.
    GetView(oneshot::Sender<IterationLogView>),
    /// Get the audit trail entries.
    GetAudit(oneshot::Sender<Vec<AuditEntry>>),
}

/// Arguments for spawning a log actor.
#[derive(Clone)]
pub struct LogActorArgs {
    /// The aggregate ID (iteration log ID).
    pub aggregate_id: String,
    /// Path to the event log file.
    pub log_path: PathBuf,
    /// Path to the snapshot file.
    pub snapshot_path: PathBuf,
    /// Snapshot after every N events.
    pub snapshot_every: u64,
    /// Shared view for projection.
    pub view: Arc<RwLock<IterationLogView>>,
    /// Shared audit trail projection.
    pub trail: Arc<RwLock<AuditTrail>>,
    /// Watch channel sender for view snapshots.
    pub snapshot_tx: watch::Sender<IterationLogView>,
    /// Broadcast channel sender for event streaming.
    pub event_tx: broadcast::Sender<LogEventEnvelope>,
    /// Services for command handling.
    pub services: LogServices,
}

/// State maintained by the log actor.
pub struct LogActorState {
    /// The CQRS framework instance.
    pub cqrs: CqrsFramework<IterationLogAggregate, FileEventStore>,
    /// The aggregate ID.
    pub aggregate_id: String,
    /// Shared view for reading.
    pub view: Arc<RwLock<IterationLogView>>,
    /// Shared audit trail for reading.
    pub trail: Arc<RwLock<AuditTrail>>,
}

/// The iteration log actor.
pub struct LogActor;

impl LogActor {
    /// Builds the CQRS framework from actor arguments.
    pub fn build_cqrs(args: &LogActorArgs) -> CqrsFramework<IterationLogAggregate, FileEventStore> {
        let store = FileEventStore::new(
            args.log_path.clone(),
            args.snapshot_path.clone(),
            args.snapshot_every,
        );

        let view_query = LogViewQuery::new(
            args.view.clone(),
            args.snapshot_tx.clone(),
            args.event_tx.clone(),
        );
        let audit_query = AuditQuery::new(args.trail.clone());

        CqrsFramework::new(
            store,
            vec![Box::new(view_query), Box::new(audit_query)],
            args.services.clone(),
        )
    }
}

#[async_trait]
impl Actor for LogActor {
    type Msg = LogMessage;
    type State = LogActorState;
    type Arguments = LogActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let cqrs = LogActor::build_cqrs(&args);

        Ok(LogActorState {
            cqrs,
            aggregate_id: args.aggregate_id,
            view: args.view,
            trail: args.trail,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            LogMessage::Command(boxed_cmd, reply) => {
                let cmd = *boxed_cmd;
                let result = state.cqrs.execute(&state.aggregate_id, cmd).await;
                let view = state.view.read().await.clone();

                let mapped = match result {
                    Ok(()) => Ok(view),
                    Err(AggregateError::UserError(err)) => Err(err),
                    Err(AggregateError::AggregateConflict) => Err(LogError::ConcurrencyConflict {
                        message: "aggregate was modified concurrently".to_string(),
                    }),
                    Err(err) => Err(LogError::StorageFailure {
                        message: err.to_string(),
                    }),
                };

                if reply.send(mapped).is_err() {
                    tracing::debug!("Command reply channel closed");
                }
            }
            LogMessage::GetView(reply) => {
                let view = state.view.read().await.clone();
                if reply.send(view).is_err() {
                    tracing::debug!("View reply channel closed");
                }
            }
            LogMessage::GetAudit(reply) => {
                let entries = state.trail.read().await.entries().to_vec();
                if reply.send(entries).is_err() {
                    tracing::debug!("Audit reply channel closed");
                }
            }
        }

        Ok(())
    }
}

/// Registry name under which a log's actor is spawned.
///
/// Spawning through the supervisor registers the actor under this name, so a
/// respawned actor is reachable at the same address as its predecessor.
pub fn actor_name(aggregate_id: &str) -> String {
    format!("iteration-log-{}", aggregate_id)
}

/// Bootstraps the view and audit trail by replaying events from an event log file.
///
/// Used when reopening an existing log so the projections match the persisted
/// stream before the actor accepts new commands. Returns default projections
/// if the log file doesn't exist.
pub fn bootstrap_projections(
    log_path: &Path,
    aggregate_id: &str,
) -> (IterationLogView, AuditTrail) {
    let mut view = IterationLogView::default();
    let mut trail = AuditTrail::default();

    let file = match File::open(log_path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return (view, trail),
        Err(_) => return (view, trail), // Return defaults on any error
    };

    let reader = BufReader::new(file);
    let mut skipped_lines = 0;

    for line in reader.lines().map_while(Result::ok) {
        if let Ok(stored) = serde_json::from_str::<StoredEvent>(&line) {
            if stored.aggregate_id == aggregate_id {
                view.apply_event(&stored.aggregate_id, &stored.event, stored.sequence);
                trail.apply_event(&stored.aggregate_id, &stored.event, stored.sequence);
            }
        } else {
            skipped_lines += 1;
        }
    }

    if skipped_lines > 0 {
        tracing::warn!("Skipped {} unparseable lines in event log", skipped_lines);
    }

    (view, trail)
}

/// Helper to create actor arguments with default configuration.
///
/// Takes the log's aggregate ID and the directory holding its event log and
/// snapshot files. For an existing log this bootstraps the projections by
/// replaying persisted events; for a new log they start empty and fill when
/// the first CreateLog command is sent.
pub fn create_actor_args(
    aggregate_id: &str,
    base_dir: &Path,
) -> anyhow::Result<(
    LogActorArgs,
    watch::Receiver<IterationLogView>,
    broadcast::Receiver<LogEventEnvelope>,
)> {
    let log_path = base_dir.join(format!("{}.lineage.jsonl", aggregate_id));
    let snapshot_path = base_dir.join(format!("{}.lineage-snapshot.json", aggregate_id));

    // Bootstrap the projections from existing events (if any)
    let (initial_view, initial_trail) = bootstrap_projections(&log_path, aggregate_id);
    let view = Arc::new(RwLock::new(initial_view.clone()));
    let trail = Arc::new(RwLock::new(initial_trail));
    let (snapshot_tx, snapshot_rx) = watch::channel(initial_view);
    let (event_tx, event_rx) = broadcast::channel(64);

    let args = LogActorArgs {
        aggregate_id: aggregate_id.to_string(),
        log_path,
        snapshot_path,
        snapshot_every: 50,
        view,
        trail,
        snapshot_tx,
        event_tx,
        services: LogServices::default(),
    };

    Ok((args, snapshot_rx, event_rx))
}

#[cfg(test)]
#[path = "tests/actor_tests.rs"]
mod tests;
