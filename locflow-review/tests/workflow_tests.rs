//! Review Workflow Integration Tests
//! Test File: workflow_tests.rs
//!
//! Drives the orchestrator through whole runs with scripted analysis
//! providers: gates, edit regression, phase advance, consolidation and
//! degraded analysis.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use helpers::{
    run_with, FailingProvider, KeywordRiskProvider, MalformedProvider, SlowProvider, RISKY_WORD,
};
use locflow_review::models::{Phase, PhaseStatus, RiskLevel, FALLBACK_ISSUE_TEXT};
use locflow_review::workflow::{GateDecision, WorkflowOrchestrator};
use locflow_review::ReviewError;

async fn approve_all(run: &WorkflowOrchestrator, phase: Phase) {
    for segment in run.list_segments().await {
        if phase != Phase::Cultural {
            run.analyze(phase, segment.id()).await.unwrap();
        }
        run.approve(phase, segment.id()).await.unwrap();
    }
}

/// TC-WF-001: High regulatory risk blocks approval until edited and re-validated
#[tokio::test]
async fn tc_wf_001_regulatory_block_edit_revalidate_advance() {
    // Given: 3 segments past Cultural, segment 2 carries a risky claim
    let provider = Arc::new(KeywordRiskProvider::default());
    let run = run_with(
        provider.clone(),
        &["Ask your doctor.", "Results guaranteed in 3 days.", "See full label."],
    );
    approve_all(&run, Phase::Cultural).await;
    assert_eq!(run.advance_phase().await.unwrap(), Phase::Regulatory);

    // When: segment 2 is analyzed and approval is attempted
    let s2 = run.analyze(Phase::Regulatory, "s2").await.unwrap();
    assert_eq!(s2.report(Phase::Regulatory).unwrap().risk_level, Some(RiskLevel::High));

    // Then: approval is blocked, citing the issue, and status is unchanged
    match run.approve(Phase::Regulatory, "s2").await {
        Err(ReviewError::GateBlocked { phase, segment_id, issues, .. }) => {
            assert_eq!(phase, Phase::Regulatory);
            assert_eq!(segment_id, "s2");
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].text, "Absolute efficacy claim");
        }
        other => panic!("expected GateBlocked, got {:?}", other),
    }
    assert_eq!(
        run.get_segment("s2").await.unwrap().status(Phase::Regulatory),
        PhaseStatus::InProgress
    );

    // When: the operator edits the claim out and re-validates
    run.edit_translation("s2", "Results may vary.").await.unwrap();
    let s2 = run.analyze(Phase::Regulatory, "s2").await.unwrap();
    assert_eq!(s2.report(Phase::Regulatory).unwrap().risk_level, Some(RiskLevel::Low));

    // Then: approval succeeds but the phase is still incomplete
    run.approve(Phase::Regulatory, "s2").await.unwrap();
    assert!(matches!(
        run.advance_phase().await,
        Err(ReviewError::PhaseIncomplete { remaining: 2, .. })
    ));
    assert_eq!(run.active_phase().await, Phase::Regulatory);

    // When: segments 1 and 3 are approved too
    for id in ["s1", "s3"] {
        run.analyze(Phase::Regulatory, id).await.unwrap();
        run.approve(Phase::Regulatory, id).await.unwrap();
    }

    // Then: advance seeds Quality with the same segments and the edited text
    assert_eq!(run.advance_phase().await.unwrap(), Phase::Quality);
    let segments = run.list_segments().await;
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1].translation(), "Results may vary.");
    assert!(segments.iter().all(|s| s.status(Phase::Quality) == PhaseStatus::Pending));
    assert!(segments.iter().all(|s| s.is_approved(Phase::Regulatory)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
}

/// TC-WF-002: Finalize joins translations in order with paragraph breaks
#[tokio::test]
async fn tc_wf_002_finalize_consolidates_in_order() {
    // Given: 3 segments approved through every phase
    let run = run_with(Arc::new(KeywordRiskProvider::default()), &["A.", "B.", "C."]);
    approve_all(&run, Phase::Cultural).await;
    run.advance_phase().await.unwrap();
    approve_all(&run, Phase::Regulatory).await;
    run.advance_phase().await.unwrap();
    approve_all(&run, Phase::Quality).await;

    // When: the run is finalized
    let deliverable = run.finalize().await.unwrap();

    // Then: the document is the ordered, paragraph-separated translations
    assert_eq!(deliverable.final_document, "A.\n\nB.\n\nC.");
    assert_eq!(deliverable.segments.len(), 3);
    assert_eq!(run.final_document().await.as_deref(), Some("A.\n\nB.\n\nC."));
    assert!(run.get_phase_progress().await.finalized);
}

/// TC-WF-003: Finalize reflects edits made after an earlier finalize
#[tokio::test]
async fn tc_wf_003_finalize_not_memoized() {
    // Given: a finalized run
    let run = run_with(Arc::new(KeywordRiskProvider::default()), &["A.", "B.", "C."]);
    for phase in [Phase::Cultural, Phase::Regulatory] {
        approve_all(&run, phase).await;
        run.advance_phase().await.unwrap();
    }
    approve_all(&run, Phase::Quality).await;
    run.finalize().await.unwrap();

    // When: segment 3 is edited, re-analyzed and re-approved
    run.edit_translation("s3", "C, updated.").await.unwrap();
    assert!(run.final_document().await.is_none());
    run.analyze(Phase::Quality, "s3").await.unwrap();
    run.approve(Phase::Quality, "s3").await.unwrap();

    // Then: finalize again yields the new text
    assert_eq!(
        run.finalize().await.unwrap().final_document,
        "A.\n\nB.\n\nC, updated."
    );
}

/// TC-WF-004: Edits never clear an earlier phase's approval
#[tokio::test]
async fn tc_wf_004_edit_keeps_upstream_approvals() {
    // Given: run in Regulatory with segment 1 approved there
    let run = run_with(Arc::new(KeywordRiskProvider::default()), &["One.", "Two."]);
    approve_all(&run, Phase::Cultural).await;
    run.advance_phase().await.unwrap();
    run.analyze(Phase::Regulatory, "s1").await.unwrap();
    run.approve(Phase::Regulatory, "s1").await.unwrap();

    // When: segment 1 is edited
    let segment = run.edit_translation("s1", "One, revised.").await.unwrap();

    // Then: Regulatory regresses, Cultural stays complete
    assert_eq!(segment.status(Phase::Regulatory), PhaseStatus::InProgress);
    assert!(!segment.is_approved(Phase::Regulatory));
    assert_eq!(segment.status(Phase::Cultural), PhaseStatus::Complete);
    assert!(segment.is_approved(Phase::Cultural));
}

/// TC-WF-005: Approval moves selection forward without wrapping
#[tokio::test]
async fn tc_wf_005_selection_advances_without_wrap() {
    // Given: 3 segments in Cultural
    let run = run_with(Arc::new(KeywordRiskProvider::default()), &["A.", "B.", "C."]);
    assert_eq!(run.selected_segment().await.as_deref(), Some("s1"));

    // When/Then: approving s1 selects s2
    run.approve(Phase::Cultural, "s1").await.unwrap();
    assert_eq!(run.selected_segment().await.as_deref(), Some("s2"));

    run.select_segment("s3").await.unwrap();
    run.approve(Phase::Cultural, "s3").await.unwrap();
    // nothing incomplete after s3; s2 is not reached by wrapping
    assert_eq!(run.selected_segment().await.as_deref(), Some("s3"));

    assert!(matches!(
        run.select_segment("missing").await,
        Err(ReviewError::NotFound(_))
    ));
}

/// TC-WF-006: Provider failures degrade to fallback reports, never errors
#[tokio::test]
async fn tc_wf_006_provider_failure_yields_fallback() {
    // Given: a provider that always fails
    let run = run_with(Arc::new(FailingProvider), &["A."]);

    // When: the segment is analyzed
    let segment = run.analyze(Phase::Cultural, "s1").await.unwrap();

    // Then: a conservative fallback report is recorded and counted as degraded
    let report = segment.report(Phase::Cultural).unwrap();
    assert!(report.generated_by_fallback);
    assert_eq!(report.overall_score, 50.0);
    assert_eq!(report.risk_level, Some(RiskLevel::Medium));
    assert_eq!(report.issues[0].text, FALLBACK_ISSUE_TEXT);
    assert_eq!(run.get_phase_progress().await.phases[0].degraded_reports, 1);
}

/// TC-WF-007: A provider timeout yields a fallback report
#[tokio::test]
async fn tc_wf_007_timeout_yields_fallback() {
    // Given: a provider slower than the 200 ms gateway timeout
    let run = run_with(
        Arc::new(SlowProvider {
            delay: Duration::from_secs(5),
        }),
        &["A."],
    );

    // When: the segment is analyzed
    let segment = run.analyze(Phase::Cultural, "s1").await.unwrap();

    // Then: fallback report, no error
    assert!(segment.report(Phase::Cultural).unwrap().generated_by_fallback);
}

/// TC-WF-008: Fallback regulatory report is approvable after manual review
#[tokio::test]
async fn tc_wf_008_fallback_regulatory_report_approvable() {
    // Given: run in Regulatory with a malformed-payload provider
    let run = run_with(Arc::new(MalformedProvider), &["A."]);
    run.approve(Phase::Cultural, "s1").await.unwrap();
    run.advance_phase().await.unwrap();

    // When: the segment is not yet analyzed, then analyzed
    assert!(matches!(
        run.gate(Phase::Regulatory, "s1").await.unwrap(),
        GateDecision::Blocked { .. }
    ));
    let segment = run.analyze(Phase::Regulatory, "s1").await.unwrap();

    // Then: the medium-risk fallback opens the gate
    assert!(segment.report(Phase::Regulatory).unwrap().generated_by_fallback);
    assert!(run.can_approve(Phase::Regulatory, "s1").await.unwrap());
    run.approve(Phase::Regulatory, "s1").await.unwrap();
}

/// TC-WF-009: Quality gate requires an analysis but ignores its score
#[tokio::test]
async fn tc_wf_009_quality_requires_analysis_only() {
    // Given: run in Quality
    let run = run_with(Arc::new(KeywordRiskProvider::default()), &["A."]);
    for phase in [Phase::Cultural, Phase::Regulatory] {
        approve_all(&run, phase).await;
        run.advance_phase().await.unwrap();
    }

    // When/Then: approval before analysis is blocked
    assert!(matches!(
        run.approve(Phase::Quality, "s1").await,
        Err(ReviewError::GateBlocked { .. })
    ));

    // When: the (now risky) text is analyzed with a high-risk result
    run.edit_translation("s1", &format!("A, {}.", RISKY_WORD)).await.unwrap();
    let segment = run.analyze(Phase::Quality, "s1").await.unwrap();
    assert_eq!(segment.report(Phase::Quality).unwrap().risk_level, Some(RiskLevel::High));

    // Then: Quality still accepts it
    run.approve(Phase::Quality, "s1").await.unwrap();
    assert!(run.finalize().await.is_ok());
}

/// TC-WF-010: Operations addressed to a non-active phase are refused
#[tokio::test]
async fn tc_wf_010_phase_must_be_active() {
    // Given: a fresh run (Cultural active)
    let run = run_with(Arc::new(KeywordRiskProvider::default()), &["A."]);

    // Then: Regulatory/Quality operations and finalize are refused
    assert!(matches!(
        run.analyze(Phase::Regulatory, "s1").await,
        Err(ReviewError::PhaseNotActive { .. })
    ));
    assert!(matches!(
        run.approve(Phase::Quality, "s1").await,
        Err(ReviewError::PhaseNotActive { .. })
    ));
    assert!(matches!(
        run.finalize().await,
        Err(ReviewError::PhaseNotActive { .. })
    ));
    assert!(matches!(
        run.analyze(Phase::Cultural, "nope").await,
        Err(ReviewError::NotFound(_))
    ));
}

/// TC-WF-011: Analyses for different segments run concurrently
#[tokio::test]
async fn tc_wf_011_concurrent_analyses_across_segments() {
    // Given: a run with 3 segments
    let run = Arc::new(run_with(
        Arc::new(KeywordRiskProvider::default()),
        &["A.", "B.", "C."],
    ));

    // When: all three are analyzed at once
    let handles: Vec<_> = ["s1", "s2", "s3"]
        .into_iter()
        .map(|id| {
            let run = run.clone();
            tokio::spawn(async move { run.analyze(Phase::Cultural, id).await })
        })
        .collect();

    // Then: every analysis lands on its own segment
    for handle in handles {
        let segment = handle.await.unwrap().unwrap();
        assert_eq!(segment.report(Phase::Cultural).unwrap().overall_score, 92.0);
    }
    let progress = run.get_phase_progress().await;
    assert_eq!(progress.phases[0].in_progress, 3);
}
