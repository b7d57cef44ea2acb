//! External collaborator contracts.
//!
//! The core delegates real work (running an iteration, generating
//! suggestions, rendering exports) to the surrounding application through
//! these traits. Rejection is the only failure signal a collaborator has;
//! there is no partial-success channel.

use crate::domain::registry::ValidationFeedback;
use crate::domain::types::{FeedbackId, IterationCost, IterationMetrics};
use crate::domain::version::VersionRecord;
use crate::domain::view::IterationLogView;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Terminal fields produced by a successful iteration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IterationOutcome {
    pub metrics: IterationMetrics,
    pub cost: IterationCost,
    pub changes: Vec<String>,
    pub notes: Option<String>,
}

/// The service that actually performs a refinement iteration.
///
/// Receives a draft (or failed, on retry) version and returns the terminal
/// fields for it. Timeout policy belongs to the executor, not the core.
#[async_trait]
pub trait IterationExecutor: Send + Sync {
    async fn run_iteration(&self, version: &VersionRecord) -> Result<IterationOutcome>;
}

/// A suggestion as proposed by the generator, before the log assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSeed {
    pub summary: String,
    pub rationale: Option<String>,
    pub related_feedback: Vec<FeedbackId>,
}

/// The AI service proposing refinements for unresolved feedback.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn generate(&self, unresolved: &[ValidationFeedback]) -> Result<Vec<SuggestionSeed>>;
}

/// Output format for log exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Md,
    Pdf,
}

/// The report renderer. Consumes a read-only snapshot; never feeds back.
#[async_trait]
pub trait LogExporter: Send + Sync {
    async fn export(&self, snapshot: &IterationLogView, format: ExportFormat) -> Result<()>;
}
