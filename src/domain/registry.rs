//! Feedback and suggestion registries.
//!
//! Both registries preserve insertion order and are owned by the aggregate;
//! version records reference their items by id only. Deleting a version never
//! deletes feedback or suggestion history.

use crate::domain::types::{FeedbackId, Severity, SuggestionId, TimestampUtc, VersionId};
use serde::{Deserialize, Serialize};

/// A reviewer or validation finding against the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFeedback {
    pub id: FeedbackId,
    pub severity: Severity,
    pub message: String,
    /// Where the finding came from (reviewer name, validation pass).
    pub source: Option<String>,
    pub is_addressed: bool,
    /// The version whose `addressed_feedback` set contains this id.
    /// Set if and only if `is_addressed`.
    pub addressed_in_iteration: Option<VersionId>,
    pub created_at: TimestampUtc,
}

impl ValidationFeedback {
    pub fn new(
        id: FeedbackId,
        severity: Severity,
        message: impl Into<String>,
        source: Option<String>,
        created_at: TimestampUtc,
    ) -> Self {
        Self {
            id,
            severity,
            message: message.into(),
            source,
            is_addressed: false,
            addressed_in_iteration: None,
            created_at,
        }
    }
}

/// An AI-proposed refinement.
///
/// `is_accepted` and `is_dismissed` are mutually exclusive and sticky: once a
/// suggestion is resolved either way it stays resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementSuggestion {
    pub id: SuggestionId,
    pub summary: String,
    pub rationale: Option<String>,
    /// Feedback items this suggestion responds to (weak references).
    pub related_feedback: Vec<FeedbackId>,
    pub is_accepted: bool,
    pub is_dismissed: bool,
    pub created_at: TimestampUtc,
    pub resolved_at: Option<TimestampUtc>,
}

impl RefinementSuggestion {
    /// True once the suggestion has been accepted or dismissed.
    pub fn is_resolved(&self) -> bool {
        self.is_accepted || self.is_dismissed
    }
}

/// Insertion-ordered collection of validation feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeedbackRegistry {
    items: Vec<ValidationFeedback>,
}

impl FeedbackRegistry {
    pub fn get(&self, id: FeedbackId) -> Option<&ValidationFeedback> {
        self.items.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: FeedbackId) -> Option<&mut ValidationFeedback> {
        self.items.iter_mut().find(|f| f.id == id)
    }

    pub fn push(&mut self, feedback: ValidationFeedback) {
        self.items.push(feedback);
    }

    pub fn items(&self) -> &[ValidationFeedback] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Feedback not yet claimed by any version, in insertion order.
    pub fn unaddressed(&self) -> Vec<&ValidationFeedback> {
        self.items.iter().filter(|f| !f.is_addressed).collect()
    }
}

/// Insertion-ordered collection of refinement suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SuggestionRegistry {
    items: Vec<RefinementSuggestion>,
}

impl SuggestionRegistry {
    pub fn get(&self, id: SuggestionId) -> Option<&RefinementSuggestion> {
        self.items.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SuggestionId) -> Option<&mut RefinementSuggestion> {
        self.items.iter_mut().find(|s| s.id == id)
    }

    pub fn push(&mut self, suggestion: RefinementSuggestion) {
        self.items.push(suggestion);
    }

    pub fn items(&self) -> &[RefinementSuggestion] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
