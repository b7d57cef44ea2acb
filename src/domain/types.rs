//! Strongly typed domain primitives for the iteration log aggregate.
//!
//! These newtypes provide type safety and semantic clarity for log, version,
//! feedback and suggestion identifiers, plus the value objects (cost, metrics)
//! shared across the domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an iteration log.
/// Used as the aggregate_id in the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId(pub Uuid);

impl LogId {
    /// Creates a new random log ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a log ID from a string.
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for LogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the project this log belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(pub Uuid);

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a validation feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackId(pub Uuid);

impl std::fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a refinement suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(pub Uuid);

impl std::fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for the user or system component issuing a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Actor used for operations performed by the system itself
    /// (executor reconciliation, generated suggestions).
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic version number (1-indexed).
///
/// A counter, not an index: numbers are allocated as `max(existing) + 1` and
/// never reused, even after a revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionNumber(pub u32);

impl VersionNumber {
    /// The number assigned to the first version of a log.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next number after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for VersionNumber {
    fn default() -> Self {
        Self::first()
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// UTC timestamp for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampUtc(pub DateTime<Utc>);

impl TimestampUtc {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the timestamp as an RFC3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for TimestampUtc {
    fn default() -> Self {
        Self::now()
    }
}

/// Lifecycle status of a version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Failed,
    Reverted,
}

impl VersionStatus {
    /// True for statuses from which an iteration run may start.
    /// Retrying a failed run is allowed; everything else is not.
    pub fn can_start_run(&self) -> bool {
        matches!(self, VersionStatus::Draft | VersionStatus::Failed)
    }

    /// True once the record's terminal fields are frozen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VersionStatus::Completed | VersionStatus::Failed | VersionStatus::Reverted
        )
    }

    /// Returns a human-readable label for this status.
    pub fn label(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "Draft",
            VersionStatus::InProgress => "In Progress",
            VersionStatus::Completed => "Completed",
            VersionStatus::Failed => "Failed",
            VersionStatus::Reverted => "Reverted",
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Model tier requested for an iteration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Fast,
    #[default]
    Standard,
    Advanced,
}

/// Severity of a validation feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Suggestion,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Suggestion => "suggestion",
        };
        write!(f, "{}", label)
    }
}

/// Token/cost accounting for one iteration run.
///
/// Fixed once the owning version leaves `in_progress`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IterationCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
}

impl IterationCost {
    pub fn new(input_tokens: u64, output_tokens: u64, total_cost: f64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_cost,
        }
    }
}

/// Optional quality scores reported by the executor, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IterationMetrics {
    pub quality_score: Option<u8>,
    pub confidence_level: Option<u8>,
    pub completeness: Option<u8>,
}

impl IterationMetrics {
    /// True when every present score is within [0, 100].
    pub fn in_range(&self) -> bool {
        [self.quality_score, self.confidence_level, self.completeness]
            .iter()
            .flatten()
            .all(|score| *score <= 100)
    }
}
