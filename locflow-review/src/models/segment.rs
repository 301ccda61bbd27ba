//! Translatable content segment and its per-phase review state
//!
//! A segment carries one [`PhaseState`] per phase it has entered. Fields are
//! read through accessors; all writes go through the segment store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AnalysisReport, Phase, PhaseStatus};

/// Upstream draft-translation record imported at run creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentImport {
    pub id: String,
    pub source_text: String,
    pub translation: String,
    /// Display label (subject line, body, disclaimer, ...)
    #[serde(rename = "type", default)]
    pub segment_type: String,
    pub target_market: String,
}

/// Review state of a segment within one phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseState {
    pub status: PhaseStatus,
    /// Most recent analysis for this phase
    pub report: Option<AnalysisReport>,
    /// Explicit operator sign-off
    pub approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl PhaseState {
    pub fn pending() -> Self {
        Self {
            status: PhaseStatus::Pending,
            report: None,
            approved: false,
            updated_at: Utc::now(),
        }
    }
}

/// One unit of translated content moving through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub(crate) id: String,
    pub(crate) source_text: String,
    pub(crate) translation: String,
    #[serde(rename = "type")]
    pub(crate) segment_type: String,
    pub(crate) target_market: String,
    pub(crate) phases: BTreeMap<Phase, PhaseState>,
    pub(crate) edited_at: Option<DateTime<Utc>>,
}

impl Segment {
    pub(crate) fn from_import(record: SegmentImport) -> Self {
        Self {
            id: record.id,
            source_text: record.source_text,
            translation: record.translation,
            segment_type: record.segment_type,
            target_market: record.target_market,
            phases: BTreeMap::new(),
            edited_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn translation(&self) -> &str {
        &self.translation
    }

    pub fn segment_type(&self) -> &str {
        &self.segment_type
    }

    pub fn target_market(&self) -> &str {
        &self.target_market
    }

    /// Last translation edit, `None` if still the imported draft
    pub fn edited_at(&self) -> Option<DateTime<Utc>> {
        self.edited_at
    }

    /// State for a phase the segment has entered
    pub fn phase_state(&self, phase: Phase) -> Option<&PhaseState> {
        self.phases.get(&phase)
    }

    /// Status for a phase; phases not yet entered read as pending
    pub fn status(&self, phase: Phase) -> PhaseStatus {
        self.phases
            .get(&phase)
            .map(|s| s.status)
            .unwrap_or(PhaseStatus::Pending)
    }

    pub fn report(&self, phase: Phase) -> Option<&AnalysisReport> {
        self.phases.get(&phase).and_then(|s| s.report.as_ref())
    }

    pub fn is_approved(&self, phase: Phase) -> bool {
        self.phases.get(&phase).map(|s| s.approved).unwrap_or(false)
    }

    pub fn is_complete(&self, phase: Phase) -> bool {
        self.status(phase) == PhaseStatus::Complete
    }
}
