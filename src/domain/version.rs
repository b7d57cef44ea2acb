//! Version records: one immutable-once-run description of an iteration attempt.

use crate::domain::types::{
    ActorId, FeedbackId, IterationCost, IterationMetrics, ModelTier, SuggestionId, TimestampUtc,
    VersionId, VersionNumber, VersionStatus,
};
use serde::{Deserialize, Serialize};

/// One iteration attempt in the lineage.
///
/// Created as a `draft` working copy; terminal fields (status, cost, metrics,
/// changes) are frozen once the status reaches `completed` or `failed`. The
/// only mutation allowed after that is the `completed -> reverted` status
/// transition performed by a revert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: VersionId,
    pub version_number: VersionNumber,
    pub name: String,
    pub description: String,
    pub status: VersionStatus,
    pub model_tier: ModelTier,
    /// Summaries of the refinement changes this iteration applied.
    pub changes: Vec<String>,
    /// Feedback ids this version claims to resolve (weak references into the
    /// feedback registry; the registry owns the items).
    pub addressed_feedback: Vec<FeedbackId>,
    /// Suggestion ids incorporated into this version (weak references).
    pub applied_suggestions: Vec<SuggestionId>,
    pub metrics: IterationMetrics,
    pub cost: IterationCost,
    /// The version this one was branched from; `None` only for the first.
    pub parent_version_id: Option<VersionId>,
    pub created_by: ActorId,
    pub created_at: TimestampUtc,
    /// Set on successful completion only; failures carry `failure_reason`.
    pub completed_at: Option<TimestampUtc>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
}

/// Parameters for creating a new version record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDraft {
    pub name: String,
    pub description: String,
    pub model_tier: ModelTier,
    pub selected_feedback: Vec<FeedbackId>,
    pub selected_suggestions: Vec<SuggestionId>,
}

impl VersionRecord {
    /// Creates a fresh draft record.
    pub fn draft(
        id: VersionId,
        version_number: VersionNumber,
        parent_version_id: Option<VersionId>,
        draft: VersionDraft,
        created_by: ActorId,
        created_at: TimestampUtc,
    ) -> Self {
        Self {
            id,
            version_number,
            name: draft.name,
            description: draft.description,
            status: VersionStatus::Draft,
            model_tier: draft.model_tier,
            changes: Vec::new(),
            addressed_feedback: draft.selected_feedback,
            applied_suggestions: draft.selected_suggestions,
            metrics: IterationMetrics::default(),
            cost: IterationCost::default(),
            parent_version_id,
            created_by,
            created_at,
            completed_at: None,
            notes: None,
            failure_reason: None,
        }
    }

    /// True while an iteration run is outstanding for this version.
    pub fn is_running(&self) -> bool {
        self.status == VersionStatus::InProgress
    }

    /// True when this version is an eligible revert target.
    /// Only completed versions qualify; `reverted` is not eligible again.
    pub fn is_revert_target(&self) -> bool {
        self.status == VersionStatus::Completed
    }
}
