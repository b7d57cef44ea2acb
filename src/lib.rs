//! Event-sourced iteration version log.
//!
//! Tracks the lineage of iterative refinement for a project: every version,
//! the feedback each one addressed, the suggestions it applied, run outcomes
//! with cost accounting, non-destructive reverts, and a complete audit trail.
//!
//! State lives in an append-only JSONL event log; the [`LineageLog`] handle
//! serializes all mutations for one log through a single actor.
//!
//! ```ignore
//! let (log, _sub) = LineageLog::open(data_dir, LogId::new()).await?;
//! log.create_log(ProjectId::from("demo"), ActorId::from("alice")).await?;
//! let version = log.create_version(draft, ActorId::from("alice")).await?;
//! let record = log.run_iteration(version.id, &executor, ActorId::from("alice")).await?;
//! ```

pub mod domain;
pub mod event_store;
pub mod lineage;

pub use domain::{
    ActorId, AuditAction, AuditEntry, ExportFormat, FeedbackId, IterationCost, IterationExecutor,
    IterationLogView, IterationMetrics, IterationOutcome, LogError, LogExporter, LogId, ModelTier,
    ProjectId, RefinementSuggestion, Severity, SuggestionGenerator, SuggestionId, SuggestionSeed,
    ValidationFeedback, VersionDraft, VersionId, VersionNumber, VersionRecord, VersionStatus,
};
pub use lineage::{LineageLog, LogSubscription};
