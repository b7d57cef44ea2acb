//! Domain model for the event-sourced iteration log.
//!
//! This module provides a strongly typed CQRS/ES domain model: every change
//! to a log's lineage goes through a command, is validated against current
//! state, and is recorded as an event in an append-only log.
//!
//! # Architecture
//!
//! - **Commands** (`cqrs/commands.rs`): Intent to change the log
//! - **Events** (`cqrs/events.rs`): Facts that have happened
//! - **Aggregate** (`cqrs/mod.rs`): Command validation and event application
//! - **View** (`view.rs`): Read-only projection for queries and export
//! - **Audit** (`audit.rs`): One audit entry per applied event
//!
//! # Usage
//!
//! ```ignore
//! use crate::domain::{LogCommand, LogEvent, IterationLogAggregate};
//!
//! // Commands are dispatched through the actor or CQRS framework
//! let cmd = LogCommand::CreateLog { ... };
//!
//! // Events are applied to rebuild state
//! for event in events {
//!     view.apply_event(aggregate_id, &event, sequence);
//! }
//! ```

pub mod actor;
pub mod audit;
pub mod collaborators;
pub mod cqrs;
pub mod errors;
pub mod registry;
pub mod rollup;
pub mod services;
pub mod supervisor;
pub mod types;
pub mod version;
pub mod view;

// Re-export CQRS types
pub use cqrs::*;

// Re-export commonly used types for convenience
pub use actor::{actor_name, create_actor_args, LogActor, LogActorArgs, LogMessage};
pub use audit::{AuditAction, AuditEntry, AuditQuery, AuditTrail};
pub use collaborators::{
    ExportFormat, IterationExecutor, IterationOutcome, LogExporter, SuggestionGenerator,
    SuggestionSeed,
};
pub use errors::LogError;
pub use registry::{FeedbackRegistry, RefinementSuggestion, SuggestionRegistry, ValidationFeedback};
pub use services::{IdProvider, LogClock, LogServices};
pub use supervisor::{LogSupervisor, SupervisorMsg};
pub use types::{
    ActorId, FeedbackId, IterationCost, IterationMetrics, LogId, ModelTier, ProjectId, Severity,
    SuggestionId, TimestampUtc, VersionId, VersionNumber, VersionStatus,
};
pub use version::{VersionDraft, VersionRecord};
pub use view::{IterationLogView, LogEventEnvelope};

#[cfg(test)]
#[path = "tests/property_tests.rs"]
mod property_tests;
