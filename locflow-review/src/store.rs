//! Segment store
//!
//! Ordered collection of segments with a narrow mutation API. Phase-scoped
//! fields (status, report, approval) change only through [`SegmentStore::update`],
//! which rejects patches aimed at another phase's namespace. Translation text
//! changes only through [`SegmentStore::edit_translation`].
//!
//! No I/O. Each patch is applied to a copy of the segment and committed only
//! if the result upholds the invariant `status == Complete ⇒ approved`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ReviewError, ReviewResult};
use crate::models::{AnalysisReport, Phase, PhaseState, PhaseStatus, Segment, SegmentImport};

/// Phase-scoped segment patch
#[derive(Debug, Clone)]
pub struct SegmentPatch {
    target: Phase,
    status: Option<PhaseStatus>,
    report: Option<AnalysisReport>,
    approved: Option<bool>,
}

impl SegmentPatch {
    /// Empty patch addressing `phase` fields
    pub fn for_phase(phase: Phase) -> Self {
        Self {
            target: phase,
            status: None,
            report: None,
            approved: None,
        }
    }

    pub fn status(mut self, status: PhaseStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn report(mut self, report: AnalysisReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn target(&self) -> Phase {
        self.target
    }
}

/// Ordered segment collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct SegmentStore {
    segments: Vec<Segment>,
    index: HashMap<String, usize>,
}

impl SegmentStore {
    /// Build the store from the upstream import; every segment enters `initial_phase`
    pub fn from_import(records: Vec<SegmentImport>, initial_phase: Phase) -> ReviewResult<Self> {
        if records.is_empty() {
            return Err(ReviewError::InvalidImport(
                "import contains no segments".to_string(),
            ));
        }

        let segments: Vec<Segment> = records
            .into_iter()
            .map(|record| {
                let mut segment = Segment::from_import(record);
                segment.phases.insert(initial_phase, PhaseState::pending());
                segment
            })
            .collect();

        Self::from_segments(segments)
    }

    /// Rebuild the store from stored segments
    pub fn from_segments(segments: Vec<Segment>) -> ReviewResult<Self> {
        let mut index = HashMap::with_capacity(segments.len());
        for (position, segment) in segments.iter().enumerate() {
            if segment.id.trim().is_empty() {
                return Err(ReviewError::InvalidImport(format!(
                    "segment at position {} has a blank id",
                    position
                )));
            }
            if index.insert(segment.id.clone(), position).is_some() {
                return Err(ReviewError::InvalidImport(format!(
                    "duplicate segment id: {}",
                    segment.id
                )));
            }
        }

        Ok(Self { segments, index })
    }

    pub fn get(&self, id: &str) -> ReviewResult<&Segment> {
        self.position(id).map(|p| &self.segments[p])
    }

    /// Segments in original import order
    pub fn list(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Position of a segment in list order
    pub fn position(&self, id: &str) -> ReviewResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ReviewError::NotFound(id.to_string()))
    }

    /// Apply a phase-scoped patch on behalf of `caller`
    pub fn update(&mut self, id: &str, caller: Phase, patch: SegmentPatch) -> ReviewResult<&Segment> {
        if patch.target != caller {
            return Err(ReviewError::PatchOutOfScope {
                caller,
                target: patch.target,
            });
        }

        let position = self.position(id)?;
        let current = self.segments[position]
            .phases
            .get(&patch.target)
            .ok_or_else(|| {
                ReviewError::InvariantViolation(format!(
                    "segment {} has not entered the {} phase",
                    id, patch.target
                ))
            })?;

        let mut next = current.clone();
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(report) = patch.report {
            next.report = Some(report);
        }
        if let Some(approved) = patch.approved {
            next.approved = approved;
        }

        if next.status == PhaseStatus::Complete && !next.approved {
            return Err(ReviewError::InvariantViolation(format!(
                "segment {} cannot complete the {} phase without approval",
                id, patch.target
            )));
        }

        next.updated_at = Utc::now();
        self.segments[position].phases.insert(patch.target, next);
        Ok(&self.segments[position])
    }

    /// Replace a segment's translation, re-opening `current_phase` and every
    /// later phase the segment has entered. Earlier phases keep their approvals.
    ///
    /// Returns the re-opened phases.
    pub fn edit_translation(
        &mut self,
        id: &str,
        new_text: impl Into<String>,
        current_phase: Phase,
    ) -> ReviewResult<Vec<Phase>> {
        let position = self.position(id)?;
        let segment = &mut self.segments[position];
        let now = Utc::now();

        segment.translation = new_text.into();
        segment.edited_at = Some(now);

        let mut reopened = Vec::new();
        for &phase in current_phase.this_and_later() {
            let state = if phase == current_phase {
                segment.phases.entry(phase).or_insert_with(PhaseState::pending)
            } else {
                match segment.phases.get_mut(&phase) {
                    Some(state) => state,
                    None => continue,
                }
            };
            state.approved = false;
            state.status = PhaseStatus::InProgress;
            state.updated_at = now;
            reopened.push(phase);
        }

        Ok(reopened)
    }

    /// Seed every segment into `phase` as pending. Existing state is kept.
    pub(crate) fn enter_phase(&mut self, phase: Phase) {
        for segment in &mut self.segments {
            segment.phases.entry(phase).or_insert_with(PhaseState::pending);
        }
    }

    /// Segments not yet complete in `phase`
    pub fn incomplete_count(&self, phase: Phase) -> usize {
        self.segments.iter().filter(|s| !s.is_complete(phase)).count()
    }
}

impl TryFrom<Vec<Segment>> for SegmentStore {
    type Error = ReviewError;

    fn try_from(segments: Vec<Segment>) -> Result<Self, Self::Error> {
        Self::from_segments(segments)
    }
}

impl From<SegmentStore> for Vec<Segment> {
    fn from(store: SegmentStore) -> Self {
        store.segments
    }
}
