//! Data models for locflow-review
//!
//! - Phase identity and per-phase segment status
//! - Segments and their per-phase review state
//! - Analysis reports produced by the gateway
//! - Workflow run context, progress and final deliverable

pub mod phase;
pub mod report;
pub mod run;
pub mod segment;

pub use phase::{Phase, PhaseStatus};
pub use report::{AnalysisReport, Issue, IssueSeverity, RiskLevel, FALLBACK_ISSUE_TEXT, FALLBACK_SCORE};
pub use run::{BrandContext, FinalDeliverable, PhaseProgress, RunContext, RunSummary, WorkflowProgress};
pub use segment::{PhaseState, Segment, SegmentImport};
