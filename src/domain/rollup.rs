//! Cost/metric rollups derived from the lineage.
//!
//! Pure functions of the version list and feedback registry: every cached
//! aggregate on the log must always equal a recomputation through this module.

use crate::domain::registry::ValidationFeedback;
use crate::domain::version::VersionRecord;

/// Total cost across all versions, regardless of status.
/// Failed attempts still cost tokens.
pub fn total_cost(versions: &[VersionRecord]) -> f64 {
    versions.iter().map(|v| v.cost.total_cost).sum()
}

/// Number of iteration attempts recorded in the lineage.
pub fn total_iterations(versions: &[VersionRecord]) -> usize {
    versions.len()
}

/// Share of feedback items addressed by some version, in [0, 100].
/// Returns 0.0 for an empty registry.
pub fn addressed_percent(feedback: &[ValidationFeedback]) -> f64 {
    if feedback.is_empty() {
        return 0.0;
    }
    let addressed = feedback.iter().filter(|f| f.is_addressed).count();
    addressed as f64 / feedback.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{
        ActorId, FeedbackId, IterationCost, ModelTier, Severity, TimestampUtc, VersionId,
        VersionNumber,
    };
    use crate::domain::version::{VersionDraft, VersionRecord};
    use uuid::Uuid;

    fn version_with_cost(number: u32, cost: f64) -> VersionRecord {
        let mut record = VersionRecord::draft(
            VersionId(Uuid::from_u128(u128::from(number))),
            VersionNumber(number),
            None,
            VersionDraft {
                name: format!("v{}", number),
                description: String::new(),
                model_tier: ModelTier::Standard,
                selected_feedback: Vec::new(),
                selected_suggestions: Vec::new(),
            },
            ActorId::from("tester"),
            TimestampUtc::now(),
        );
        record.cost = IterationCost::new(100, 50, cost);
        record
    }

    fn feedback(addressed: bool) -> ValidationFeedback {
        let mut item = ValidationFeedback::new(
            FeedbackId(Uuid::new_v4()),
            Severity::Major,
            "finding",
            None,
            TimestampUtc::now(),
        );
        item.is_addressed = addressed;
        item
    }

    #[test]
    fn total_cost_sums_all_statuses() {
        let versions = vec![
            version_with_cost(1, 0.002),
            version_with_cost(2, 0.005),
            version_with_cost(3, 0.001),
        ];
        let total = total_cost(&versions);
        assert!((total - 0.008).abs() < 1e-9);
    }

    #[test]
    fn total_cost_empty_is_zero() {
        assert_eq!(total_cost(&[]), 0.0);
    }

    #[test]
    fn total_iterations_counts_every_attempt() {
        let versions = vec![version_with_cost(1, 0.0), version_with_cost(2, 0.0)];
        assert_eq!(total_iterations(&versions), 2);
    }

    #[test]
    fn addressed_percent_empty_registry() {
        assert_eq!(addressed_percent(&[]), 0.0);
    }

    #[test]
    fn addressed_percent_partial() {
        let items = vec![feedback(true), feedback(false), feedback(true), feedback(false)];
        assert!((addressed_percent(&items) - 50.0).abs() < 1e-9);
    }
}
