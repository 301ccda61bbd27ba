//! Workflow run context, progress tracking and final deliverable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Phase, Segment};

/// Brand/therapeutic metadata passed to every analysis call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandContext {
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub therapeutic_area: Option<String>,
    #[serde(default)]
    pub indication: Option<String>,
}

/// Run-wide analysis parameters fixed at creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// Asset type (email, detail aid, banner, ...)
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub brand_context: BrandContext,
}

/// Per-phase segment counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub complete: usize,
    /// Latest reports that are fallback substitutes
    pub degraded_reports: usize,
    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,
}

/// Progress across the whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub run_id: Uuid,
    pub active_phase: Phase,
    pub phases: Vec<PhaseProgress>,
    pub selected_segment: Option<String>,
    pub finalized: bool,
}

/// Consolidated document plus the approved segment list for audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDeliverable {
    pub run_id: Uuid,
    pub final_document: String,
    pub segments: Vec<Segment>,
    pub finalized_at: DateTime<Utc>,
}

/// Short run description for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub active_phase: Phase,
    pub segment_count: usize,
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
