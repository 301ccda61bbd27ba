//! Workflow orchestrator
//!
//! Owns one workflow run: the segment store, the active phase, operator
//! selection and the final document. Phases are traversed strictly forward
//! (Cultural → Regulatory → Quality); there is no rewind. Edits after approval
//! are handled by the store's regression rule instead.
//!
//! **Operator surface:**
//! - [`select_segment`](WorkflowOrchestrator::select_segment)
//! - [`analyze`](WorkflowOrchestrator::analyze)
//! - [`edit_translation`](WorkflowOrchestrator::edit_translation)
//! - [`approve`](WorkflowOrchestrator::approve)
//! - [`advance_phase`](WorkflowOrchestrator::advance_phase)
//! - [`finalize`](WorkflowOrchestrator::finalize)
//! - reads: [`get_segment`](WorkflowOrchestrator::get_segment),
//!   [`list_segments`](WorkflowOrchestrator::list_segments),
//!   [`get_phase_progress`](WorkflowOrchestrator::get_phase_progress)
//!
//! Run state sits behind one `RwLock`, so each operation is atomic with
//! respect to the others. The lock is released while the analysis gateway is
//! awaited; the in-flight registry decides whether the result may still be
//! written once it returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use locflow_common::events::{EventBus, LocflowEvent};

use super::in_flight::InFlightRegistry;
use super::phase_controller::{GateDecision, PhaseController};
use crate::error::{ReviewError, ReviewResult};
use crate::gateway::{AnalysisGateway, AnalysisRequest};
use crate::models::{
    FinalDeliverable, Phase, RunContext, RunSummary, Segment, SegmentImport, WorkflowProgress,
};
use crate::store::SegmentStore;

/// Paragraph boundary placed between segments in the final document
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Serialized run state, written by the persistence layer
///
/// In-flight analyses are not part of the snapshot. `revision` grows with
/// every mutation, so a stored snapshot is never replaced by an older one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    #[serde(default)]
    pub revision: u64,
    pub context: RunContext,
    pub active_phase: Phase,
    pub selected_segment: Option<String>,
    pub final_document: Option<String>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub segments: SegmentStore,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct RunState {
    store: SegmentStore,
    active: Phase,
    selected: Option<String>,
    final_document: Option<String>,
    finalized_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    revision: u64,
    in_flight: InFlightRegistry,
}

impl RunState {
    fn ensure_active(&self, phase: Phase) -> ReviewResult<()> {
        if phase != self.active {
            return Err(ReviewError::PhaseNotActive {
                requested: phase,
                active: self.active,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    fn touch_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
        self.revision += 1;
    }

    /// Drop the deliverable once any segment leaves the fully gated state
    fn invalidate_final_document(&mut self, run_id: Uuid) {
        if self.final_document.take().is_some() {
            self.finalized_at = None;
            info!(run_id = %run_id, "Final document invalidated, finalize again after re-approval");
        }
    }
}

/// Sequences the three phase controllers over one workflow run
pub struct WorkflowOrchestrator {
    run_id: Uuid,
    created_at: DateTime<Utc>,
    context: RunContext,
    gateway: AnalysisGateway,
    /// Indexed by [`Phase::index`]
    controllers: Vec<PhaseController>,
    state: RwLock<RunState>,
    event_bus: Option<EventBus>,
}

impl WorkflowOrchestrator {
    /// Create a run from the upstream draft-translation import
    ///
    /// Every segment enters the Cultural phase as pending and the first segment
    /// is selected.
    pub fn new(
        segments: Vec<SegmentImport>,
        context: RunContext,
        gateway: AnalysisGateway,
    ) -> ReviewResult<Self> {
        let store = SegmentStore::from_import(segments, Phase::Cultural)?;
        let now = Utc::now();
        let run_id = Uuid::new_v4();

        info!(
            run_id = %run_id,
            segments = store.len(),
            provider = gateway.provider_name(),
            "Workflow run created"
        );

        Ok(Self::assemble(
            run_id,
            now,
            context,
            gateway,
            RunState {
                selected: store.list().first().map(|s| s.id().to_string()),
                store,
                active: Phase::Cultural,
                final_document: None,
                finalized_at: None,
                updated_at: now,
                revision: 0,
                in_flight: InFlightRegistry::default(),
            },
        ))
    }

    /// Rebuild a run from a stored snapshot
    pub fn from_snapshot(snapshot: RunSnapshot, gateway: AnalysisGateway) -> ReviewResult<Self> {
        if snapshot.segments.is_empty() {
            return Err(ReviewError::InvalidImport(format!(
                "snapshot of run {} contains no segments",
                snapshot.run_id
            )));
        }
        if let Some(selected) = &snapshot.selected_segment {
            snapshot.segments.get(selected)?;
        }

        debug!(run_id = %snapshot.run_id, active_phase = %snapshot.active_phase, "Restoring workflow run");

        Ok(Self::assemble(
            snapshot.run_id,
            snapshot.created_at,
            snapshot.context,
            gateway,
            RunState {
                store: snapshot.segments,
                active: snapshot.active_phase,
                selected: snapshot.selected_segment,
                final_document: snapshot.final_document,
                finalized_at: snapshot.finalized_at,
                updated_at: snapshot.updated_at,
                revision: snapshot.revision,
                in_flight: InFlightRegistry::default(),
            },
        ))
    }

    fn assemble(
        run_id: Uuid,
        created_at: DateTime<Utc>,
        context: RunContext,
        gateway: AnalysisGateway,
        state: RunState,
    ) -> Self {
        Self {
            run_id,
            created_at,
            context,
            gateway,
            controllers: Phase::ALL.iter().map(|&p| PhaseController::for_phase(p)).collect(),
            state: RwLock::new(state),
            event_bus: None,
        }
    }

    /// Publish run events on `event_bus`
    pub fn with_events(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn controller(&self, phase: Phase) -> &PhaseController {
        &self.controllers[phase.index()]
    }

    fn emit(&self, event: LocflowEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }

    /// Serialize the current run state
    pub async fn snapshot(&self) -> RunSnapshot {
        let state = self.state.read().await;
        RunSnapshot {
            run_id: self.run_id,
            revision: state.revision,
            context: self.context.clone(),
            active_phase: state.active,
            selected_segment: state.selected.clone(),
            final_document: state.final_document.clone(),
            finalized_at: state.finalized_at,
            segments: state.store.clone(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Move the operator's selection
    pub async fn select_segment(&self, id: &str) -> ReviewResult<Segment> {
        let mut state = self.state.write().await;
        let segment = state.store.get(id)?.clone();
        state.selected = Some(segment.id().to_string());
        state.touch();
        drop(state);

        self.emit(LocflowEvent::SegmentSelected {
            run_id: self.run_id,
            segment_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(segment)
    }

    pub async fn selected_segment(&self) -> Option<String> {
        self.state.read().await.selected.clone()
    }

    /// Run (or re-run) the analysis of one segment for the active phase
    ///
    /// The new report replaces the previous one and any earlier sign-off for
    /// the phase is withdrawn. Provider failures arrive as fallback reports.
    /// Fails with `AnalysisSuperseded` if a newer analysis of the same segment
    /// and phase, an edit, or a phase advance overtook this one; its result is
    /// then discarded.
    pub async fn analyze(&self, phase: Phase, id: &str) -> ReviewResult<Segment> {
        let (ticket, request) = {
            let mut state = self.state.write().await;
            state.ensure_active(phase)?;
            self.controller(phase).begin_analysis(&mut state.store, id)?;
            state.invalidate_final_document(self.run_id);

            let request = AnalysisRequest::new(phase, state.store.get(id)?, &self.context);
            let ticket = state.in_flight.register(id, phase);
            state.touch();
            (ticket, request)
        };

        self.emit(LocflowEvent::AnalysisStarted {
            run_id: self.run_id,
            segment_id: id.to_string(),
            phase: phase.as_str().to_string(),
            timestamp: Utc::now(),
        });

        let report = tokio::select! {
            _ = ticket.token.cancelled() => None,
            report = self.gateway.analyze_request(&request) => Some(report),
        };

        let mut state = self.state.write().await;
        let report = match report {
            Some(report) if state.in_flight.complete(&ticket) => report,
            _ => {
                debug!(
                    run_id = %self.run_id,
                    segment_id = %id,
                    phase = %phase,
                    generation = ticket.generation,
                    "Discarding superseded analysis"
                );
                return Err(ReviewError::AnalysisSuperseded {
                    segment_id: id.to_string(),
                    phase,
                });
            }
        };

        let event = LocflowEvent::AnalysisCompleted {
            run_id: self.run_id,
            segment_id: id.to_string(),
            phase: phase.as_str().to_string(),
            overall_score: report.overall_score,
            risk_level: report.risk_level.map(|r| r.as_str().to_string()),
            generated_by_fallback: report.generated_by_fallback,
            timestamp: Utc::now(),
        };

        let segment = self
            .controller(phase)
            .record_report(&mut state.store, id, report)?
            .clone();
        state.touch();
        drop(state);

        self.emit(event);
        Ok(segment)
    }

    /// Replace a segment's translation
    ///
    /// Re-opens the active phase (and any later phase the segment has entered)
    /// without touching earlier approvals. Analyses in flight for the re-opened
    /// phases are cancelled, since they assessed the old text.
    pub async fn edit_translation(&self, id: &str, text: impl Into<String>) -> ReviewResult<Segment> {
        let mut state = self.state.write().await;
        let active = state.active;
        let reopened = state.store.edit_translation(id, text, active)?;

        for &phase in &reopened {
            state.in_flight.cancel(id, phase);
        }
        state.invalidate_final_document(self.run_id);
        state.touch();
        let segment = state.store.get(id)?.clone();
        drop(state);

        debug!(run_id = %self.run_id, segment_id = %id, reopened = ?reopened, "Translation edited");

        self.emit(LocflowEvent::TranslationEdited {
            run_id: self.run_id,
            segment_id: id.to_string(),
            reopened_phases: reopened.iter().map(|p| p.as_str().to_string()).collect(),
            timestamp: Utc::now(),
        });
        Ok(segment)
    }

    /// Gate decision for one segment in one phase
    pub async fn gate(&self, phase: Phase, id: &str) -> ReviewResult<GateDecision> {
        let state = self.state.read().await;
        Ok(self.controller(phase).gate(state.store.get(id)?))
    }

    pub async fn can_approve(&self, phase: Phase, id: &str) -> ReviewResult<bool> {
        Ok(self.gate(phase, id).await?.is_open())
    }

    /// Record operator sign-off for a segment in the active phase
    ///
    /// On success the selection moves to the next segment (list order) that is
    /// not yet complete; it does not wrap. A closed gate fails with
    /// `GateBlocked` carrying the responsible issues and changes nothing.
    pub async fn approve(&self, phase: Phase, id: &str) -> ReviewResult<Segment> {
        let mut state = self.state.write().await;
        state.ensure_active(phase)?;

        let outcome = self.controller(phase).approve(&mut state.store, id);
        match outcome {
            Ok(next) => {
                if let Some(next) = next {
                    state.selected = Some(next);
                }
                state.touch();
                let segment = state.store.get(id)?.clone();
                drop(state);

                debug!(run_id = %self.run_id, segment_id = %id, phase = %phase, "Segment approved");
                self.emit(LocflowEvent::SegmentApproved {
                    run_id: self.run_id,
                    segment_id: id.to_string(),
                    phase: phase.as_str().to_string(),
                    timestamp: Utc::now(),
                });
                Ok(segment)
            }
            Err(ReviewError::GateBlocked {
                phase,
                segment_id,
                reason,
                issues,
            }) => {
                drop(state);
                info!(
                    run_id = %self.run_id,
                    segment_id = %segment_id,
                    phase = %phase,
                    gate = self.controller(phase).gate_name(),
                    reason = %reason,
                    issues = issues.len(),
                    "Approval blocked by gate"
                );
                self.emit(LocflowEvent::ApprovalBlocked {
                    run_id: self.run_id,
                    segment_id: segment_id.clone(),
                    phase: phase.as_str().to_string(),
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                Err(ReviewError::GateBlocked {
                    phase,
                    segment_id,
                    reason,
                    issues,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Move to the next phase
    ///
    /// Fails with `PhaseIncomplete` (leaving the active phase unchanged) until
    /// every segment is complete. The next phase is seeded with the same
    /// segments and their current translations; selection resets to the first
    /// segment.
    pub async fn advance_phase(&self) -> ReviewResult<Phase> {
        let mut state = self.state.write().await;
        let from = state.active;

        let remaining = state.store.incomplete_count(from);
        if remaining > 0 {
            return Err(ReviewError::PhaseIncomplete {
                phase: from,
                remaining,
            });
        }
        let to = from.next().ok_or(ReviewError::NoNextPhase(from))?;

        let cancelled = state.in_flight.cancel_all();
        state.store.enter_phase(to);
        state.active = to;
        state.selected = state.store.list().first().map(|s| s.id().to_string());
        state.touch();
        drop(state);

        info!(
            run_id = %self.run_id,
            from = %from,
            to = %to,
            cancelled_analyses = cancelled,
            "Phase advanced"
        );
        self.emit(LocflowEvent::PhaseAdvanced {
            run_id: self.run_id,
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
            timestamp: Utc::now(),
        });
        Ok(to)
    }

    /// Consolidate the approved translations into the final document
    ///
    /// Only valid in the Quality phase once every segment is complete. The
    /// document is rebuilt from current translations on every call.
    pub async fn finalize(&self) -> ReviewResult<FinalDeliverable> {
        let mut state = self.state.write().await;
        state.ensure_active(Phase::Quality)?;

        let remaining = state.store.incomplete_count(Phase::Quality);
        if remaining > 0 {
            return Err(ReviewError::PhaseIncomplete {
                phase: Phase::Quality,
                remaining,
            });
        }

        let final_document = state
            .store
            .list()
            .iter()
            .map(Segment::translation)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR);
        let finalized_at = Utc::now();

        state.final_document = Some(final_document.clone());
        state.finalized_at = Some(finalized_at);
        state.touch_at(finalized_at);
        let segments = state.store.list().to_vec();
        drop(state);

        info!(
            run_id = %self.run_id,
            segments = segments.len(),
            document_length = final_document.len(),
            "Run finalized"
        );
        self.emit(LocflowEvent::RunFinalized {
            run_id: self.run_id,
            segment_count: segments.len(),
            document_length: final_document.len(),
            timestamp: finalized_at,
        });

        Ok(FinalDeliverable {
            run_id: self.run_id,
            final_document,
            segments,
            finalized_at,
        })
    }

    pub async fn get_segment(&self, id: &str) -> ReviewResult<Segment> {
        Ok(self.state.read().await.store.get(id)?.clone())
    }

    /// Segments in original import order
    pub async fn list_segments(&self) -> Vec<Segment> {
        self.state.read().await.store.list().to_vec()
    }

    pub async fn get_phase_progress(&self) -> WorkflowProgress {
        let state = self.state.read().await;
        WorkflowProgress {
            run_id: self.run_id,
            active_phase: state.active,
            phases: self.controllers.iter().map(|c| c.progress(&state.store)).collect(),
            selected_segment: state.selected.clone(),
            finalized: state.final_document.is_some(),
        }
    }

    pub async fn active_phase(&self) -> Phase {
        self.state.read().await.active
    }

    pub async fn final_document(&self) -> Option<String> {
        self.state.read().await.final_document.clone()
    }

    pub async fn summary(&self) -> RunSummary {
        let state = self.state.read().await;
        RunSummary {
            run_id: self.run_id,
            active_phase: state.active,
            segment_count: state.store.len(),
            finalized: state.final_document.is_some(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Cancel every analysis in flight, e.g. when the run is discarded
    pub async fn cancel_pending_analyses(&self) -> usize {
        self.state.write().await.in_flight.cancel_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AnalysisProvider, ProviderError};
    use crate::models::{PhaseStatus, RiskLevel};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// First call is slow and scores 10, later calls answer at once with 90
    struct SlowThenFast {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for SlowThenFast {
        fn name(&self) -> &'static str {
            "slow-then-fast"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(json!({ "overallScore": 10, "riskLevel": "high", "issues": [] }))
            } else {
                Ok(json!({ "overallScore": 90, "riskLevel": "low", "issues": [] }))
            }
        }
    }

    /// First call answers at once with 80, later calls take 300ms
    struct FastThenSlow {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for FastThenSlow {
        fn name(&self) -> &'static str {
            "fast-then-slow"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            Ok(json!({ "overallScore": 80, "riskLevel": "low", "issues": [] }))
        }
    }

    fn fast_then_slow() -> Arc<dyn AnalysisProvider> {
        Arc::new(FastThenSlow {
            calls: AtomicUsize::new(0),
        })
    }

    struct Fixed(Value);

    #[async_trait]
    impl AnalysisProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn imports(texts: &[&str]) -> Vec<SegmentImport> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| SegmentImport {
                id: format!("s{}", i + 1),
                source_text: format!("source {}", i + 1),
                translation: text.to_string(),
                segment_type: "body".to_string(),
                target_market: "es-ES".to_string(),
            })
            .collect()
    }

    fn orchestrator(provider: Arc<dyn AnalysisProvider>, texts: &[&str]) -> WorkflowOrchestrator {
        let gateway = AnalysisGateway::new(provider, Duration::from_secs(2), 4);
        WorkflowOrchestrator::new(imports(texts), RunContext::default(), gateway).unwrap()
    }

    fn low_risk() -> Arc<dyn AnalysisProvider> {
        Arc::new(Fixed(json!({ "overallScore": 88, "riskLevel": "low", "issues": [] })))
    }

    async fn complete_phase(run: &WorkflowOrchestrator, phase: Phase) {
        for segment in run.list_segments().await {
            if phase != Phase::Cultural {
                run.analyze(phase, segment.id()).await.unwrap();
            }
            run.approve(phase, segment.id()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_run_starts_in_cultural_with_first_selected() {
        let run = orchestrator(low_risk(), &["A.", "B."]);
        assert_eq!(run.active_phase().await, Phase::Cultural);
        assert_eq!(run.selected_segment().await.as_deref(), Some("s1"));
        let progress = run.get_phase_progress().await;
        assert_eq!(progress.phases[0].pending, 2);
        assert!(!progress.finalized);
    }

    #[tokio::test]
    async fn test_newer_analysis_supersedes_older() {
        let run = Arc::new(orchestrator(
            Arc::new(SlowThenFast {
                calls: AtomicUsize::new(0),
            }),
            &["A."],
        ));
        run.approve(Phase::Cultural, "s1").await.unwrap();
        run.advance_phase().await.unwrap();

        let first = {
            let run = run.clone();
            tokio::spawn(async move { run.analyze(Phase::Regulatory, "s1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = run.analyze(Phase::Regulatory, "s1").await.unwrap();
        assert_eq!(second.report(Phase::Regulatory).unwrap().overall_score, 90.0);

        let first = first.await.unwrap();
        assert!(matches!(first, Err(ReviewError::AnalysisSuperseded { .. })));

        let segment = run.get_segment("s1").await.unwrap();
        assert_eq!(
            segment.report(Phase::Regulatory).unwrap().risk_level,
            Some(RiskLevel::Low)
        );
    }

    #[tokio::test]
    async fn test_edit_cancels_analysis_of_old_text() {
        let run = Arc::new(orchestrator(fast_then_slow(), &["A."]));
        let before = run.analyze(Phase::Cultural, "s1").await.unwrap();
        let previous_report = before.report(Phase::Cultural).unwrap().generated_at;

        let pending = {
            let run = run.clone();
            tokio::spawn(async move { run.analyze(Phase::Cultural, "s1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let edited = run.edit_translation("s1", "A, revised.").await.unwrap();
        assert_eq!(edited.translation(), "A, revised.");

        assert!(matches!(
            pending.await.unwrap(),
            Err(ReviewError::AnalysisSuperseded {
                phase: Phase::Cultural,
                ..
            })
        ));

        let segment = run.get_segment("s1").await.unwrap();
        assert_eq!(segment.translation(), "A, revised.");
        assert_eq!(segment.status(Phase::Cultural), PhaseStatus::InProgress);
        let report = segment.report(Phase::Cultural).unwrap();
        assert_eq!(report.generated_at, previous_report);
        assert_eq!(report.overall_score, 80.0);
    }

    #[tokio::test]
    async fn test_cancel_pending_analyses() {
        let run = Arc::new(orchestrator(fast_then_slow(), &["A.", "B."]));
        run.analyze(Phase::Cultural, "s1").await.unwrap();

        let pending = {
            let run = run.clone();
            tokio::spawn(async move { run.analyze(Phase::Cultural, "s2").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(run.cancel_pending_analyses().await, 1);
        assert!(matches!(
            pending.await.unwrap(),
            Err(ReviewError::AnalysisSuperseded { .. })
        ));
        assert!(run.get_segment("s2").await.unwrap().report(Phase::Cultural).is_none());
        assert_eq!(run.cancel_pending_analyses().await, 0);
    }

    #[tokio::test]
    async fn test_revision_grows_with_mutations() {
        let run = orchestrator(low_risk(), &["A."]);
        let start = run.snapshot().await.revision;

        run.select_segment("s1").await.unwrap();
        run.approve(Phase::Cultural, "s1").await.unwrap();
        assert_eq!(run.snapshot().await.revision, start + 2);

        // refused operations leave the revision alone
        assert!(run.analyze(Phase::Quality, "s1").await.is_err());
        assert_eq!(run.snapshot().await.revision, start + 2);
    }

    #[tokio::test]
    async fn test_analyze_requires_active_phase() {
        let run = orchestrator(low_risk(), &["A."]);
        assert!(matches!(
            run.analyze(Phase::Quality, "s1").await,
            Err(ReviewError::PhaseNotActive {
                requested: Phase::Quality,
                active: Phase::Cultural
            })
        ));
        assert!(matches!(
            run.approve(Phase::Regulatory, "s1").await,
            Err(ReviewError::PhaseNotActive { .. })
        ));
    }

    #[tokio::test]
    async fn test_reanalysis_withdraws_approval() {
        let run = orchestrator(low_risk(), &["A.", "B."]);
        run.approve(Phase::Cultural, "s1").await.unwrap();
        let segment = run.analyze(Phase::Cultural, "s1").await.unwrap();
        assert!(!segment.is_approved(Phase::Cultural));
        assert_eq!(segment.status(Phase::Cultural), PhaseStatus::InProgress);
    }

    #[tokio::test]
    async fn test_advance_refused_until_complete() {
        let run = orchestrator(low_risk(), &["A.", "B."]);
        run.approve(Phase::Cultural, "s1").await.unwrap();

        match run.advance_phase().await {
            Err(ReviewError::PhaseIncomplete { phase, remaining }) => {
                assert_eq!(phase, Phase::Cultural);
                assert_eq!(remaining, 1);
            }
            other => panic!("expected PhaseIncomplete, got {:?}", other),
        }
        assert_eq!(run.active_phase().await, Phase::Cultural);
    }

    #[tokio::test]
    async fn test_finalize_guarded_and_not_memoized() {
        let run = orchestrator(low_risk(), &["A.", "B."]);
        assert!(matches!(
            run.finalize().await,
            Err(ReviewError::PhaseNotActive { .. })
        ));

        complete_phase(&run, Phase::Cultural).await;
        run.advance_phase().await.unwrap();
        complete_phase(&run, Phase::Regulatory).await;
        run.advance_phase().await.unwrap();
        assert!(matches!(
            run.advance_phase().await,
            Err(ReviewError::NoNextPhase(Phase::Quality))
        ));
        assert!(matches!(
            run.finalize().await,
            Err(ReviewError::PhaseIncomplete { .. })
        ));
        complete_phase(&run, Phase::Quality).await;

        let deliverable = run.finalize().await.unwrap();
        assert_eq!(deliverable.final_document, "A.\n\nB.");
        assert_eq!(deliverable.segments.len(), 2);

        // edit invalidates the deliverable until the segment is re-approved
        run.edit_translation("s2", "B, revised.").await.unwrap();
        assert!(run.final_document().await.is_none());
        assert!(run.get_segment("s2").await.unwrap().is_approved(Phase::Regulatory));
        assert!(matches!(
            run.finalize().await,
            Err(ReviewError::PhaseIncomplete { remaining: 1, .. })
        ));

        run.analyze(Phase::Quality, "s2").await.unwrap();
        run.approve(Phase::Quality, "s2").await.unwrap();
        assert_eq!(run.finalize().await.unwrap().final_document, "A.\n\nB, revised.");
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let run = orchestrator(low_risk(), &["A."]).with_events(bus);

        run.select_segment("s1").await.unwrap();
        run.approve(Phase::Cultural, "s1").await.unwrap();
        run.advance_phase().await.unwrap();
        assert!(run.approve(Phase::Regulatory, "s1").await.is_err());

        let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type())
            .collect();
        assert_eq!(
            kinds,
            vec!["SegmentSelected", "SegmentApproved", "PhaseAdvanced", "ApprovalBlocked"]
        );
    }

    #[tokio::test]
    async fn test_snapshot_restores_state() {
        let run = orchestrator(low_risk(), &["A.", "B."]);
        run.approve(Phase::Cultural, "s1").await.unwrap();
        run.edit_translation("s2", "B2.").await.unwrap();

        let snapshot = run.snapshot().await;
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = WorkflowOrchestrator::from_snapshot(
            serde_json::from_str(&json).unwrap(),
            AnalysisGateway::new(low_risk(), Duration::from_secs(1), 1),
        )
        .unwrap();

        assert_eq!(restored.run_id(), run.run_id());
        assert_eq!(restored.selected_segment().await.as_deref(), Some("s2"));
        let s2 = restored.get_segment("s2").await.unwrap();
        assert_eq!(s2.translation(), "B2.");
        assert_eq!(s2.status(Phase::Cultural), PhaseStatus::InProgress);
        assert!(restored.get_segment("s1").await.unwrap().is_complete(Phase::Cultural));
    }
}
