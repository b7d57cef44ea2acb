//! Unit tests for IterationLogAggregate command handling and event application.

use crate::domain::collaborators::{IterationOutcome, SuggestionSeed};
use crate::domain::cqrs::{IterationLogAggregate, LogState};
use crate::domain::errors::LogError;
use crate::domain::rollup;
use crate::domain::services::{IdProvider, LogServices};
use crate::domain::types::{
    ActorId, FeedbackId, IterationCost, IterationMetrics, ModelTier, ProjectId, Severity,
    SuggestionId, VersionId, VersionNumber, VersionStatus,
};
use crate::domain::version::VersionDraft;
use crate::domain::{LogCommand, LogEvent};
use cqrs_es::Aggregate;

/// Deterministic services for testing (sequential ids).
fn test_services() -> LogServices {
    LogServices {
        ids: IdProvider::sequential(),
        ..LogServices::default()
    }
}

fn actor() -> ActorId {
    ActorId::from("tester")
}

fn draft(name: &str) -> VersionDraft {
    VersionDraft {
        name: name.to_string(),
        description: format!("{} description", name),
        model_tier: ModelTier::Standard,
        selected_feedback: Vec::new(),
        selected_suggestions: Vec::new(),
    }
}

fn outcome(cost: f64) -> IterationOutcome {
    IterationOutcome {
        metrics: IterationMetrics {
            quality_score: Some(80),
            confidence_level: Some(75),
            completeness: Some(90),
        },
        cost: IterationCost::new(1_000, 500, cost),
        changes: vec!["refined section 2".to_string()],
        notes: None,
    }
}

/// Handle a command and apply the resulting events.
async fn drive(
    agg: &mut IterationLogAggregate,
    services: &LogServices,
    cmd: LogCommand,
) -> Result<Vec<LogEvent>, LogError> {
    let events = agg.handle(cmd, services).await?;
    for event in events.clone() {
        agg.apply(event);
    }
    Ok(events)
}

async fn initialized(services: &LogServices) -> IterationLogAggregate {
    let mut agg = IterationLogAggregate::default();
    drive(
        &mut agg,
        services,
        LogCommand::CreateLog {
            project_id: ProjectId::from("proj-1"),
            actor: actor(),
        },
    )
    .await
    .unwrap();
    agg
}

/// Create a version and return its id.
async fn create_version(
    agg: &mut IterationLogAggregate,
    services: &LogServices,
    name: &str,
) -> VersionId {
    create_version_with(agg, services, draft(name)).await
}

async fn create_version_with(
    agg: &mut IterationLogAggregate,
    services: &LogServices,
    draft: VersionDraft,
) -> VersionId {
    let events = drive(
        agg,
        services,
        LogCommand::CreateVersion {
            draft,
            actor: actor(),
        },
    )
    .await
    .unwrap();
    match &events[0] {
        LogEvent::VersionCreated { version, .. } => version.id,
        other => panic!("expected VersionCreated, got {:?}", other),
    }
}

/// Run one full start+complete cycle for a version.
async fn complete_run(
    agg: &mut IterationLogAggregate,
    services: &LogServices,
    version_id: VersionId,
    cost: f64,
) {
    drive(
        agg,
        services,
        LogCommand::StartIteration {
            version_id,
            actor: actor(),
        },
    )
    .await
    .unwrap();
    drive(
        agg,
        services,
        LogCommand::CompleteIteration {
            version_id,
            outcome: outcome(cost),
        },
    )
    .await
    .unwrap();
}

fn data(agg: &IterationLogAggregate) -> &crate::domain::cqrs::IterationLogData {
    match &agg.state {
        LogState::Active(data) => data,
        _ => panic!("expected Active state"),
    }
}

async fn register_feedback(
    agg: &mut IterationLogAggregate,
    services: &LogServices,
    severity: Severity,
) -> FeedbackId {
    let events = drive(
        agg,
        services,
        LogCommand::RegisterFeedback {
            severity,
            message: "something is off".to_string(),
            source: Some("reviewer".to_string()),
            actor: actor(),
        },
    )
    .await
    .unwrap();
    match &events[0] {
        LogEvent::FeedbackRegistered { feedback, .. } => feedback.id,
        other => panic!("expected FeedbackRegistered, got {:?}", other),
    }
}

async fn propose_suggestion(
    agg: &mut IterationLogAggregate,
    services: &LogServices,
) -> SuggestionId {
    let events = drive(
        agg,
        services,
        LogCommand::RecordSuggestions {
            seeds: vec![SuggestionSeed {
                summary: "tighten the abstract".to_string(),
                rationale: None,
                related_feedback: Vec::new(),
            }],
        },
    )
    .await
    .unwrap();
    match &events[0] {
        LogEvent::SuggestionsProposed { suggestions, .. } => suggestions[0].id,
        other => panic!("expected SuggestionsProposed, got {:?}", other),
    }
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn create_log_on_uninitialized_succeeds() {
    let services = test_services();
    let agg = IterationLogAggregate::default();

    let events = agg
        .handle(
            LogCommand::CreateLog {
                project_id: ProjectId::from("proj-1"),
                actor: actor(),
            },
            &services,
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], LogEvent::LogCreated { .. }));
}

#[tokio::test]
async fn create_log_twice_fails() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::CreateLog {
            project_id: ProjectId::from("proj-2"),
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

#[tokio::test]
async fn commands_before_create_log_fail() {
    let services = test_services();
    let agg = IterationLogAggregate::default();

    let result = agg
        .handle(
            LogCommand::CreateVersion {
                draft: draft("v1"),
                actor: actor(),
            },
            &services,
        )
        .await;

    assert!(matches!(result, Err(LogError::NotInitialized)));
}

// ============================================================================
// Version creation and numbering
// ============================================================================

#[tokio::test]
async fn version_numbers_increase_and_pointer_follows() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let v1 = create_version(&mut agg, &services, "v1").await;
    let v2 = create_version(&mut agg, &services, "v2").await;

    let data = data(&agg);
    assert_eq!(data.versions().len(), 2);
    assert_eq!(data.versions()[0].version_number, VersionNumber(1));
    assert_eq!(data.versions()[1].version_number, VersionNumber(2));
    assert_eq!(data.current_version_id(), Some(v2));
    assert_eq!(data.version(v1).unwrap().parent_version_id, None);
    assert_eq!(data.version(v2).unwrap().parent_version_id, Some(v1));
}

#[tokio::test]
async fn version_numbers_are_never_reused_after_revert() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.10).await;
    let v2 = create_version(&mut agg, &services, "v2").await;
    complete_run(&mut agg, &services, v2, 0.20).await;

    drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let v3 = create_version(&mut agg, &services, "v3").await;
    let data = data(&agg);
    assert_eq!(data.version(v3).unwrap().version_number, VersionNumber(3));
    // Branches from the post-revert current version, not the reverted tip.
    assert_eq!(data.version(v3).unwrap().parent_version_id, Some(v1));
}

#[tokio::test]
async fn create_version_claims_selected_feedback() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let fid = register_feedback(&mut agg, &services, Severity::Major).await;

    let mut d = draft("v1");
    d.selected_feedback = vec![fid];
    let v1 = create_version_with(&mut agg, &services, d).await;

    let data = data(&agg);
    let feedback = data.feedback().get(fid).unwrap();
    assert!(feedback.is_addressed);
    assert_eq!(feedback.addressed_in_iteration, Some(v1));
    assert_eq!(data.version(v1).unwrap().addressed_feedback, vec![fid]);
}

#[tokio::test]
async fn create_version_rejects_unknown_feedback() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let mut d = draft("v1");
    d.selected_feedback = vec![FeedbackId(uuid::Uuid::new_v4())];
    let result = drive(
        &mut agg,
        &services,
        LogCommand::CreateVersion {
            draft: d,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidReference { .. })));
    assert!(data(&agg).versions().is_empty());
}

#[tokio::test]
async fn create_version_rejects_already_claimed_feedback() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let fid = register_feedback(&mut agg, &services, Severity::Critical).await;

    let mut d = draft("v1");
    d.selected_feedback = vec![fid];
    create_version_with(&mut agg, &services, d).await;

    let mut d2 = draft("v2");
    d2.selected_feedback = vec![fid];
    let result = drive(
        &mut agg,
        &services,
        LogCommand::CreateVersion {
            draft: d2,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidReference { .. })));
}

#[tokio::test]
async fn create_version_rejects_dismissed_suggestion() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let sid = propose_suggestion(&mut agg, &services).await;
    drive(
        &mut agg,
        &services,
        LogCommand::DismissSuggestion {
            suggestion_id: sid,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let mut d = draft("v1");
    d.selected_suggestions = vec![sid];
    let result = drive(
        &mut agg,
        &services,
        LogCommand::CreateVersion {
            draft: d,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidReference { .. })));
}

#[tokio::test]
async fn create_version_rejects_duplicate_suggestion_ids() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let sid = propose_suggestion(&mut agg, &services).await;

    let mut d = draft("v1");
    d.selected_suggestions = vec![sid, sid];
    let result = drive(
        &mut agg,
        &services,
        LogCommand::CreateVersion {
            draft: d,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidReference { .. })));
    assert!(data(&agg).versions().is_empty());
}

// ============================================================================
// Iteration runs
// ============================================================================

#[tokio::test]
async fn start_iteration_marks_version_in_progress() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;

    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        data(&agg).version(v1).unwrap().status,
        VersionStatus::InProgress
    );
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;

    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let result = drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LogError::AlreadyRunning { version_id }) if version_id == v1
    ));
}

#[tokio::test]
async fn completed_version_cannot_be_rerun() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.05).await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

#[tokio::test]
async fn failed_version_can_be_retried() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;

    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();
    drive(
        &mut agg,
        &services,
        LogCommand::FailIteration {
            version_id: v1,
            reason: "model timeout".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(data(&agg).version(v1).unwrap().status, VersionStatus::Failed);
    assert_eq!(
        data(&agg).version(v1).unwrap().failure_reason.as_deref(),
        Some("model timeout")
    );

    // Retry is allowed from failed.
    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();
    assert_eq!(
        data(&agg).version(v1).unwrap().status,
        VersionStatus::InProgress
    );
}

#[tokio::test]
async fn complete_without_outstanding_run_fails() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::CompleteIteration {
            version_id: v1,
            outcome: outcome(0.05),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

#[tokio::test]
async fn complete_rejects_out_of_range_metrics() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let mut bad = outcome(0.05);
    bad.metrics.quality_score = Some(101);
    let result = drive(
        &mut agg,
        &services,
        LogCommand::CompleteIteration {
            version_id: v1,
            outcome: bad,
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

#[tokio::test]
async fn complete_records_outcome_and_accumulates_cost() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.10).await;
    let v2 = create_version(&mut agg, &services, "v2").await;
    complete_run(&mut agg, &services, v2, 0.25).await;

    let data = data(&agg);
    let record = data.version(v1).unwrap();
    assert_eq!(record.status, VersionStatus::Completed);
    assert!(record.completed_at.is_some());
    assert_eq!(record.cost.total_cost, 0.10);
    assert_eq!(record.changes, vec!["refined section 2".to_string()]);

    assert!((data.total_cost() - 0.35).abs() < 1e-9);
    assert!((data.total_cost() - rollup::total_cost(data.versions())).abs() < 1e-9);
}

#[tokio::test]
async fn cancel_marks_version_failed_with_reason() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    drive(
        &mut agg,
        &services,
        LogCommand::CancelIteration {
            version_id: v1,
            reason: "operator abort".to_string(),
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let record = data(&agg).version(v1).unwrap();
    assert_eq!(record.status, VersionStatus::Failed);
    assert_eq!(record.failure_reason.as_deref(), Some("operator abort"));
    // No cost was added for the aborted run.
    assert_eq!(data(&agg).total_cost(), 0.0);
}

// ============================================================================
// Revert
// ============================================================================

#[tokio::test]
async fn revert_moves_pointer_and_marks_old_current_reverted() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.10).await;
    let v2 = create_version(&mut agg, &services, "v2").await;
    complete_run(&mut agg, &services, v2, 0.20).await;

    drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let data = data(&agg);
    assert_eq!(data.current_version_id(), Some(v1));
    assert_eq!(data.version(v2).unwrap().status, VersionStatus::Reverted);
    // Non-destructive: both records and their costs survive.
    assert_eq!(data.versions().len(), 2);
    assert!((data.total_cost() - 0.30).abs() < 1e-9);
}

#[tokio::test]
async fn revert_to_current_version_is_rejected() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.10).await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v1,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidTarget { .. })));
}

#[tokio::test]
async fn revert_to_non_completed_version_is_rejected() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await; // stays draft
    let v2 = create_version(&mut agg, &services, "v2").await;
    complete_run(&mut agg, &services, v2, 0.10).await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v1,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidTarget { .. })));
}

#[tokio::test]
async fn reverted_version_is_not_a_revert_target() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.10).await;
    let v2 = create_version(&mut agg, &services, "v2").await;
    complete_run(&mut agg, &services, v2, 0.10).await;

    // v2 -> v1 leaves v2 reverted.
    drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let result = drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v2,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidTarget { .. })));
}

#[tokio::test]
async fn revert_while_current_version_running_is_rejected() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let v1 = create_version(&mut agg, &services, "v1").await;
    complete_run(&mut agg, &services, v1, 0.10).await;
    let v2 = create_version(&mut agg, &services, "v2").await;
    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v2,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let result = drive(
        &mut agg,
        &services,
        LogCommand::RevertToVersion {
            target_version_id: v1,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

// ============================================================================
// Feedback claims
// ============================================================================

#[tokio::test]
async fn unclaim_feedback_from_draft_version_releases_it() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let fid = register_feedback(&mut agg, &services, Severity::Minor).await;

    let mut d = draft("v1");
    d.selected_feedback = vec![fid];
    let v1 = create_version_with(&mut agg, &services, d).await;

    drive(
        &mut agg,
        &services,
        LogCommand::UnclaimFeedback {
            feedback_id: fid,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let data = data(&agg);
    let feedback = data.feedback().get(fid).unwrap();
    assert!(!feedback.is_addressed);
    assert_eq!(feedback.addressed_in_iteration, None);
    assert!(data.version(v1).unwrap().addressed_feedback.is_empty());
}

#[tokio::test]
async fn unclaim_is_frozen_once_version_leaves_draft() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let fid = register_feedback(&mut agg, &services, Severity::Minor).await;

    let mut d = draft("v1");
    d.selected_feedback = vec![fid];
    let v1 = create_version_with(&mut agg, &services, d).await;
    drive(
        &mut agg,
        &services,
        LogCommand::StartIteration {
            version_id: v1,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let result = drive(
        &mut agg,
        &services,
        LogCommand::UnclaimFeedback {
            feedback_id: fid,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

#[tokio::test]
async fn unclaim_unaddressed_feedback_fails() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let fid = register_feedback(&mut agg, &services, Severity::Suggestion).await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::UnclaimFeedback {
            feedback_id: fid,
            actor: actor(),
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidState { .. })));
}

// ============================================================================
// Suggestions
// ============================================================================

#[tokio::test]
async fn record_suggestions_with_unknown_feedback_reference_fails() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let result = drive(
        &mut agg,
        &services,
        LogCommand::RecordSuggestions {
            seeds: vec![SuggestionSeed {
                summary: "fix citations".to_string(),
                rationale: None,
                related_feedback: vec![FeedbackId(uuid::Uuid::new_v4())],
            }],
        },
    )
    .await;

    assert!(matches!(result, Err(LogError::InvalidReference { .. })));
}

#[tokio::test]
async fn empty_suggestion_batch_emits_no_events() {
    let services = test_services();
    let mut agg = initialized(&services).await;

    let events = drive(
        &mut agg,
        &services,
        LogCommand::RecordSuggestions { seeds: Vec::new() },
    )
    .await
    .unwrap();

    assert!(events.is_empty());
}

#[tokio::test]
async fn suggestion_accept_is_sticky_and_idempotent() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let sid = propose_suggestion(&mut agg, &services).await;

    let events = drive(
        &mut agg,
        &services,
        LogCommand::AcceptSuggestion {
            suggestion_id: sid,
            actor: actor(),
        },
    )
    .await
    .unwrap();
    assert_eq!(events.len(), 1);

    // Repeat accept: no-op, no event.
    let events = drive(
        &mut agg,
        &services,
        LogCommand::AcceptSuggestion {
            suggestion_id: sid,
            actor: actor(),
        },
    )
    .await
    .unwrap();
    assert!(events.is_empty());

    // Opposite outcome after resolution: conflict.
    let result = drive(
        &mut agg,
        &services,
        LogCommand::DismissSuggestion {
            suggestion_id: sid,
            actor: actor(),
        },
    )
    .await;
    assert!(matches!(result, Err(LogError::AlreadyResolved { .. })));

    let suggestion = data(&agg).suggestions().get(sid).unwrap();
    assert!(suggestion.is_accepted);
    assert!(!suggestion.is_dismissed);
    assert!(suggestion.resolved_at.is_some());
}

#[tokio::test]
async fn suggestion_dismiss_then_accept_is_rejected() {
    let services = test_services();
    let mut agg = initialized(&services).await;
    let sid = propose_suggestion(&mut agg, &services).await;

    drive(
        &mut agg,
        &services,
        LogCommand::DismissSuggestion {
            suggestion_id: sid,
            actor: actor(),
        },
    )
    .await
    .unwrap();

    let result = drive(
        &mut agg,
        &services,
        LogCommand::AcceptSuggestion {
            suggestion_id: sid,
            actor: actor(),
        },
    )
    .await;
    assert!(matches!(result, Err(LogError::AlreadyResolved { .. })));
}
