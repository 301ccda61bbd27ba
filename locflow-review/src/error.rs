//! Error types for locflow-review
//!
//! [`ReviewError`] is the engine taxonomy. Every variant is operator-actionable
//! and is surfaced verbatim to the caller. Analysis provider failures never
//! appear here; the gateway absorbs them into fallback reports.
//!
//! [`ApiError`] maps engine and infrastructure errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{Issue, Phase};

/// Engine result type
pub type ReviewResult<T> = Result<T, ReviewError>;

/// Engine error type
#[derive(Debug, Clone, Error)]
pub enum ReviewError {
    /// Referenced segment id does not exist in the run
    #[error("Segment not found: {0}")]
    NotFound(String),

    /// Approval attempted while the phase gate is closed
    #[error("Approval blocked for segment {segment_id} in {phase} phase: {reason}")]
    GateBlocked {
        phase: Phase,
        segment_id: String,
        reason: String,
        /// Findings responsible for the block
        issues: Vec<Issue>,
    },

    /// Advance/finalize attempted before every segment completed the phase
    #[error("{phase} phase incomplete: {remaining} segment(s) not yet approved")]
    PhaseIncomplete { phase: Phase, remaining: usize },

    /// Operation addressed a phase other than the active one
    #[error("{requested} phase is not active (active phase: {active})")]
    PhaseNotActive { requested: Phase, active: Phase },

    /// Advance attempted from the last phase
    #[error("No phase follows {0}; finalize the run instead")]
    NoNextPhase(Phase),

    /// Store patch addressed another phase's fields
    #[error("{caller} phase may not modify {target} phase fields")]
    PatchOutOfScope { caller: Phase, target: Phase },

    /// Store patch would break the approval/completion invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Upstream import rejected
    #[error("Invalid import: {0}")]
    InvalidImport(String),

    /// A newer analysis for the same segment and phase replaced this one
    #[error("Analysis of segment {segment_id} in {phase} phase superseded by a newer request")]
    AnalysisSuperseded { segment_id: String, phase: Phase },
}

impl ReviewError {
    /// Machine-readable code used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            ReviewError::NotFound(_) => "NOT_FOUND",
            ReviewError::GateBlocked { .. } => "GATE_BLOCKED",
            ReviewError::PhaseIncomplete { .. } => "PHASE_INCOMPLETE",
            ReviewError::PhaseNotActive { .. } => "PHASE_NOT_ACTIVE",
            ReviewError::NoNextPhase(_) => "NO_NEXT_PHASE",
            ReviewError::PatchOutOfScope { .. } => "PATCH_OUT_OF_SCOPE",
            ReviewError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            ReviewError::InvalidImport(_) => "INVALID_IMPORT",
            ReviewError::AnalysisSuperseded { .. } => "ANALYSIS_SUPERSEDED",
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Engine error (status depends on variant)
    #[error(transparent)]
    Review(#[from] ReviewError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// locflow-common error
    #[error("Common error: {0}")]
    Common(#[from] locflow_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Review(err) => {
                let status = match &err {
                    ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
                    ReviewError::InvalidImport(_) => StatusCode::BAD_REQUEST,
                    ReviewError::GateBlocked { .. }
                    | ReviewError::PhaseIncomplete { .. }
                    | ReviewError::PhaseNotActive { .. }
                    | ReviewError::NoNextPhase(_)
                    | ReviewError::AnalysisSuperseded { .. } => StatusCode::CONFLICT,
                    ReviewError::PatchOutOfScope { .. } | ReviewError::InvariantViolation(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let details = match &err {
                    ReviewError::GateBlocked { phase, issues, .. } => Some(json!({
                        "phase": phase,
                        "issues": issues,
                    })),
                    ReviewError::PhaseIncomplete { phase, remaining } => Some(json!({
                        "phase": phase,
                        "remaining": remaining,
                    })),
                    _ => None,
                };
                (status, err.code(), err.to_string(), details)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
                None,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
                None,
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
