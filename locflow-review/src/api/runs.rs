//! Workflow run API handlers
//!
//! Operator surface over HTTP. Every mutating handler persists the run
//! snapshot before responding.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use locflow_common::events::LocflowEvent;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AnalysisReport, FinalDeliverable, Issue, Phase, RunContext, RunSummary, Segment,
    SegmentImport, WorkflowProgress,
};
use crate::workflow::{GateDecision, WorkflowOrchestrator};
use crate::AppState;

/// POST /runs request: the upstream draft-translation import
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub segments: Vec<SegmentImport>,
    #[serde(default)]
    pub context: RunContext,
}

/// Run summary with progress
#[derive(Debug, Serialize)]
pub struct RunDetailResponse {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub progress: WorkflowProgress,
    pub final_document: Option<String>,
}

/// POST /runs/:run_id/selection request
#[derive(Debug, Deserialize)]
pub struct SelectSegmentRequest {
    pub segment_id: String,
}

/// PUT /runs/:run_id/segments/:segment_id/translation request
#[derive(Debug, Deserialize)]
pub struct EditTranslationRequest {
    pub translation: String,
}

/// POST .../analyze response
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub segment_id: String,
    pub phase: Phase,
    pub report: Option<AnalysisReport>,
    /// Report is a fallback substitute; the operator must review manually
    pub manual_review_required: bool,
    pub segment: Segment,
}

/// GET .../gate response
#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub segment_id: String,
    pub phase: Phase,
    pub can_approve: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub issues: Vec<Issue>,
}

/// POST .../approve response
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub segment: Segment,
    pub selected_segment: Option<String>,
}

/// POST /runs/:run_id/advance response
#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub active_phase: Phase,
    pub progress: WorkflowProgress,
}

fn parse_phase(raw: &str) -> ApiResult<Phase> {
    raw.parse::<Phase>().map_err(ApiError::BadRequest)
}

async fn run_detail(run: &WorkflowOrchestrator) -> RunDetailResponse {
    RunDetailResponse {
        summary: run.summary().await,
        progress: run.get_phase_progress().await,
        final_document: run.final_document().await,
    }
}

/// POST /runs
///
/// Create a workflow run from the upstream import. Returns 201 Created.
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> ApiResult<(StatusCode, Json<RunDetailResponse>)> {
    let run = WorkflowOrchestrator::new(request.segments, request.context, state.gateway.clone())?
        .with_events(state.event_bus.clone());
    let run = Arc::new(run);

    state.save_snapshot(&run).await?;
    state.runs.write().await.insert(run.run_id(), run.clone());

    let detail = run_detail(&run).await;
    state.event_bus.emit_lossy(LocflowEvent::RunCreated {
        run_id: run.run_id(),
        segment_count: detail.summary.segment_count,
        timestamp: Utc::now(),
    });

    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /runs
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    let runs: Vec<Arc<WorkflowOrchestrator>> = state.runs.read().await.values().cloned().collect();

    let mut summaries = Vec::with_capacity(runs.len());
    for run in runs {
        summaries.push(run.summary().await);
    }
    summaries.sort_by_key(|s| s.created_at);

    Json(summaries)
}

/// GET /runs/:run_id
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunDetailResponse>> {
    let run = state.run(run_id).await?;
    Ok(Json(run_detail(&run).await))
}

/// DELETE /runs/:run_id
///
/// Discard a run whose upstream draft changed. In-flight analyses are
/// cancelled.
pub async fn discard_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let run = state
        .runs
        .write()
        .await
        .remove(&run_id)
        .ok_or_else(|| ApiError::NotFound(format!("Workflow run not found: {}", run_id)))?;

    let cancelled = run.cancel_pending_analyses().await;
    crate::db::runs::delete_run(&state.db, run_id).await?;

    tracing::info!(run_id = %run_id, cancelled_analyses = cancelled, "Workflow run discarded");
    state.event_bus.emit_lossy(LocflowEvent::RunDiscarded {
        run_id,
        timestamp: Utc::now(),
    });

    Ok(StatusCode::NO_CONTENT)
}

/// GET /runs/:run_id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<WorkflowProgress>> {
    let run = state.run(run_id).await?;
    Ok(Json(run.get_phase_progress().await))
}

/// GET /runs/:run_id/segments
pub async fn list_segments(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Segment>>> {
    let run = state.run(run_id).await?;
    Ok(Json(run.list_segments().await))
}

/// GET /runs/:run_id/segments/:segment_id
pub async fn get_segment(
    State(state): State<AppState>,
    Path((run_id, segment_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Segment>> {
    let run = state.run(run_id).await?;
    Ok(Json(run.get_segment(&segment_id).await?))
}

/// POST /runs/:run_id/selection
pub async fn select_segment(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<SelectSegmentRequest>,
) -> ApiResult<Json<Segment>> {
    let run = state.run(run_id).await?;
    let segment = run.select_segment(&request.segment_id).await?;
    state.persist(&run).await?;
    Ok(Json(segment))
}

/// PUT /runs/:run_id/segments/:segment_id/translation
pub async fn edit_translation(
    State(state): State<AppState>,
    Path((run_id, segment_id)): Path<(Uuid, String)>,
    Json(request): Json<EditTranslationRequest>,
) -> ApiResult<Json<Segment>> {
    let run = state.run(run_id).await?;
    let segment = run.edit_translation(&segment_id, request.translation).await?;
    state.persist(&run).await?;
    Ok(Json(segment))
}

/// POST /runs/:run_id/phases/:phase/segments/:segment_id/analyze
///
/// Blocks until the analysis service answers or times out. A superseded
/// request answers 409 and leaves the newer result in place.
pub async fn analyze(
    State(state): State<AppState>,
    Path((run_id, phase, segment_id)): Path<(Uuid, String, String)>,
) -> ApiResult<Json<AnalysisResponse>> {
    let phase = parse_phase(&phase)?;
    let run = state.run(run_id).await?;

    let outcome = run.analyze(phase, &segment_id).await;
    // analysis start already changed the segment, persist either way;
    // a discarded run is not written back
    state.persist(&run).await?;
    let segment = outcome?;

    let report = segment.report(phase).cloned();
    Ok(Json(AnalysisResponse {
        segment_id,
        phase,
        manual_review_required: report.as_ref().is_some_and(|r| r.generated_by_fallback),
        report,
        segment,
    }))
}

/// GET /runs/:run_id/phases/:phase/segments/:segment_id/gate
pub async fn get_gate(
    State(state): State<AppState>,
    Path((run_id, phase, segment_id)): Path<(Uuid, String, String)>,
) -> ApiResult<Json<GateResponse>> {
    let phase = parse_phase(&phase)?;
    let run = state.run(run_id).await?;

    let (reason, issues) = match run.gate(phase, &segment_id).await? {
        GateDecision::Open => (None, Vec::new()),
        GateDecision::Blocked { reason, issues } => (Some(reason), issues),
    };

    Ok(Json(GateResponse {
        segment_id,
        phase,
        can_approve: reason.is_none(),
        reason,
        issues,
    }))
}

/// POST /runs/:run_id/phases/:phase/segments/:segment_id/approve
///
/// 409 with the blocking issues in `details` when the gate is closed.
pub async fn approve(
    State(state): State<AppState>,
    Path((run_id, phase, segment_id)): Path<(Uuid, String, String)>,
) -> ApiResult<Json<ApproveResponse>> {
    let phase = parse_phase(&phase)?;
    let run = state.run(run_id).await?;

    let segment = run.approve(phase, &segment_id).await?;
    state.persist(&run).await?;

    Ok(Json(ApproveResponse {
        segment,
        selected_segment: run.selected_segment().await,
    }))
}

/// POST /runs/:run_id/advance
pub async fn advance_phase(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<AdvanceResponse>> {
    let run = state.run(run_id).await?;
    let active_phase = run.advance_phase().await?;
    state.persist(&run).await?;

    Ok(Json(AdvanceResponse {
        active_phase,
        progress: run.get_phase_progress().await,
    }))
}

/// POST /runs/:run_id/finalize
pub async fn finalize(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<FinalDeliverable>> {
    let run = state.run(run_id).await?;
    let deliverable = run.finalize().await?;
    state.persist(&run).await?;
    Ok(Json(deliverable))
}

/// Build workflow run routes
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/runs", post(create_run).get(list_runs))
        .route("/runs/:run_id", get(get_run).delete(discard_run))
        .route("/runs/:run_id/progress", get(get_progress))
        .route("/runs/:run_id/segments", get(list_segments))
        .route("/runs/:run_id/segments/:segment_id", get(get_segment))
        .route("/runs/:run_id/selection", post(select_segment))
        .route(
            "/runs/:run_id/segments/:segment_id/translation",
            put(edit_translation),
        )
        .route(
            "/runs/:run_id/phases/:phase/segments/:segment_id/analyze",
            post(analyze),
        )
        .route(
            "/runs/:run_id/phases/:phase/segments/:segment_id/gate",
            get(get_gate),
        )
        .route(
            "/runs/:run_id/phases/:phase/segments/:segment_id/approve",
            post(approve),
        )
        .route("/runs/:run_id/advance", post(advance_phase))
        .route("/runs/:run_id/finalize", post(finalize))
}
