//! Phase controller
//!
//! One controller per phase, parameterized by an [`ApprovalGate`]:
//! - **Cultural**: [`AdvisoryGate`], always approvable (scores are advisory)
//! - **Regulatory**: [`RiskGate`], blocked without a report or at high risk
//! - **Quality**: [`AnalysisRequiredGate`], blocked only without a report
//!
//! Per-segment state machine within a phase:
//! `pending -(analyze)-> in-progress -(approve, gate open)-> complete`,
//! with edits and re-analysis returning the segment to `in-progress`.
//!
//! Controllers touch only their own phase namespace of the segment store.

use crate::error::{ReviewError, ReviewResult};
use crate::models::{AnalysisReport, Issue, Phase, PhaseProgress, PhaseStatus, RiskLevel, Segment};
use crate::store::{SegmentPatch, SegmentStore};

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Open,
    Blocked {
        reason: String,
        /// Findings responsible for the block
        issues: Vec<Issue>,
    },
}

impl GateDecision {
    pub fn is_open(&self) -> bool {
        matches!(self, GateDecision::Open)
    }
}

/// Phase-specific approval predicate over the latest report
pub trait ApprovalGate: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, report: Option<&AnalysisReport>) -> GateDecision;
}

/// Always open; records operator sign-off only
#[derive(Debug, Default)]
pub struct AdvisoryGate;

impl ApprovalGate for AdvisoryGate {
    fn name(&self) -> &'static str {
        "advisory"
    }

    fn evaluate(&self, _report: Option<&AnalysisReport>) -> GateDecision {
        GateDecision::Open
    }
}

/// Closed at or above `blocking` risk, and while no report exists
#[derive(Debug)]
pub struct RiskGate {
    pub blocking: RiskLevel,
}

impl Default for RiskGate {
    fn default() -> Self {
        Self {
            blocking: RiskLevel::High,
        }
    }
}

impl ApprovalGate for RiskGate {
    fn name(&self) -> &'static str {
        "risk"
    }

    fn evaluate(&self, report: Option<&AnalysisReport>) -> GateDecision {
        let Some(report) = report else {
            return GateDecision::Blocked {
                reason: "segment has not been analyzed for compliance".to_string(),
                issues: Vec::new(),
            };
        };

        match report.risk_level {
            Some(risk) if risk >= self.blocking => GateDecision::Blocked {
                reason: format!(
                    "{} compliance risk; edit the translation and re-validate",
                    risk
                ),
                issues: report.issues.clone(),
            },
            _ => GateDecision::Open,
        }
    }
}

/// Closed only until a report exists; the score itself is informational
#[derive(Debug, Default)]
pub struct AnalysisRequiredGate;

impl ApprovalGate for AnalysisRequiredGate {
    fn name(&self) -> &'static str {
        "analysis-required"
    }

    fn evaluate(&self, report: Option<&AnalysisReport>) -> GateDecision {
        match report {
            Some(_) => GateDecision::Open,
            None => GateDecision::Blocked {
                reason: "segment has not been analyzed".to_string(),
                issues: Vec::new(),
            },
        }
    }
}

/// Orchestrates analysis bookkeeping and approval for one phase
pub struct PhaseController {
    phase: Phase,
    gate: Box<dyn ApprovalGate>,
}

impl PhaseController {
    /// Controller with the standard gate for `phase`
    pub fn for_phase(phase: Phase) -> Self {
        let gate: Box<dyn ApprovalGate> = match phase {
            Phase::Cultural => Box::new(AdvisoryGate),
            Phase::Regulatory => Box::new(RiskGate::default()),
            Phase::Quality => Box::new(AnalysisRequiredGate),
        };
        Self::with_gate(phase, gate)
    }

    pub fn with_gate(phase: Phase, gate: Box<dyn ApprovalGate>) -> Self {
        Self { phase, gate }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn gate_name(&self) -> &'static str {
        self.gate.name()
    }

    /// Gate decision against the segment's latest report for this phase
    pub fn gate(&self, segment: &Segment) -> GateDecision {
        self.gate.evaluate(segment.report(self.phase))
    }

    pub fn can_approve(&self, segment: &Segment) -> bool {
        self.gate(segment).is_open()
    }

    /// Mark a segment as under analysis; any prior sign-off is withdrawn
    pub fn begin_analysis(&self, store: &mut SegmentStore, id: &str) -> ReviewResult<()> {
        store.update(
            id,
            self.phase,
            SegmentPatch::for_phase(self.phase)
                .status(PhaseStatus::InProgress)
                .approved(false),
        )?;
        Ok(())
    }

    /// Store the latest report, replacing the previous one
    ///
    /// A segment approved while the analysis was in flight is re-opened if
    /// the new report closes the gate.
    pub fn record_report<'a>(
        &self,
        store: &'a mut SegmentStore,
        id: &str,
        report: AnalysisReport,
    ) -> ReviewResult<&'a Segment> {
        let reopen = self.gate.evaluate(Some(&report)) != GateDecision::Open
            || store.get(id)?.status(self.phase) == PhaseStatus::Pending;

        let mut patch = SegmentPatch::for_phase(self.phase).report(report);
        if reopen {
            patch = patch.status(PhaseStatus::InProgress).approved(false);
        }
        store.update(id, self.phase, patch)
    }

    /// Record operator sign-off
    ///
    /// Fails with `GateBlocked` (leaving the segment untouched) when the gate is
    /// closed. On success returns the id of the next segment after this one
    /// that is not yet complete, if any.
    pub fn approve(&self, store: &mut SegmentStore, id: &str) -> ReviewResult<Option<String>> {
        let segment = store.get(id)?;
        if let GateDecision::Blocked { reason, issues } = self.gate(segment) {
            return Err(ReviewError::GateBlocked {
                phase: self.phase,
                segment_id: id.to_string(),
                reason,
                issues,
            });
        }

        store.update(
            id,
            self.phase,
            SegmentPatch::for_phase(self.phase)
                .approved(true)
                .status(PhaseStatus::Complete),
        )?;

        let position = store.position(id)?;
        Ok(store.list()[position + 1..]
            .iter()
            .find(|s| !s.is_complete(self.phase))
            .map(|s| s.id().to_string()))
    }

    /// Every segment complete for this phase
    pub fn is_phase_complete(&self, store: &SegmentStore) -> bool {
        store.incomplete_count(self.phase) == 0
    }

    pub fn progress(&self, store: &SegmentStore) -> PhaseProgress {
        let total = store.len();
        let (mut pending, mut in_progress, mut complete, mut degraded_reports) = (0, 0, 0, 0);

        for segment in store.list() {
            match segment.status(self.phase) {
                PhaseStatus::Pending => pending += 1,
                PhaseStatus::InProgress => in_progress += 1,
                PhaseStatus::Complete => complete += 1,
            }
            if segment
                .report(self.phase)
                .map(|r| r.generated_by_fallback)
                .unwrap_or(false)
            {
                degraded_reports += 1;
            }
        }

        PhaseProgress {
            phase: self.phase,
            total,
            pending,
            in_progress,
            complete,
            degraded_reports,
            percentage: if total > 0 {
                (complete as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}
