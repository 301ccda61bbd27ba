//! Event types for the locflow event system
//!
//! Review workflow events are emitted by the orchestrator and fanned out to
//! SSE clients through [`EventBus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// locflow event types
///
/// Phase names are carried as their lowercase wire names
/// (`cultural`, `regulatory`, `quality`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LocflowEvent {
    /// Workflow run created from an upstream draft import
    RunCreated {
        run_id: Uuid,
        segment_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Workflow run discarded (upstream draft changed)
    RunDiscarded {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Operator selection moved to a segment
    SegmentSelected {
        run_id: Uuid,
        segment_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Analysis requested for a segment in a phase
    AnalysisStarted {
        run_id: Uuid,
        segment_id: String,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// Analysis report recorded for a segment in a phase
    ///
    /// `generated_by_fallback` is set when the AI provider could not be used
    /// and the report is a conservative substitute (manual review required).
    AnalysisCompleted {
        run_id: Uuid,
        segment_id: String,
        phase: String,
        overall_score: f64,
        risk_level: Option<String>,
        generated_by_fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// Segment translation edited; listed phases were re-opened
    TranslationEdited {
        run_id: Uuid,
        segment_id: String,
        reopened_phases: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Operator sign-off recorded
    SegmentApproved {
        run_id: Uuid,
        segment_id: String,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// Approval rejected by the phase gate
    ApprovalBlocked {
        run_id: Uuid,
        segment_id: String,
        phase: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Active phase moved forward
    PhaseAdvanced {
        run_id: Uuid,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// Final document consolidated
    RunFinalized {
        run_id: Uuid,
        segment_count: usize,
        document_length: usize,
        timestamp: DateTime<Utc>,
    },
}

impl LocflowEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LocflowEvent::RunCreated { .. } => "RunCreated",
            LocflowEvent::RunDiscarded { .. } => "RunDiscarded",
            LocflowEvent::SegmentSelected { .. } => "SegmentSelected",
            LocflowEvent::AnalysisStarted { .. } => "AnalysisStarted",
            LocflowEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            LocflowEvent::TranslationEdited { .. } => "TranslationEdited",
            LocflowEvent::SegmentApproved { .. } => "SegmentApproved",
            LocflowEvent::ApprovalBlocked { .. } => "ApprovalBlocked",
            LocflowEvent::PhaseAdvanced { .. } => "PhaseAdvanced",
            LocflowEvent::RunFinalized { .. } => "RunFinalized",
        }
    }

    /// Run the event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            LocflowEvent::RunCreated { run_id, .. }
            | LocflowEvent::RunDiscarded { run_id, .. }
            | LocflowEvent::SegmentSelected { run_id, .. }
            | LocflowEvent::AnalysisStarted { run_id, .. }
            | LocflowEvent::AnalysisCompleted { run_id, .. }
            | LocflowEvent::TranslationEdited { run_id, .. }
            | LocflowEvent::SegmentApproved { run_id, .. }
            | LocflowEvent::ApprovalBlocked { run_id, .. }
            | LocflowEvent::PhaseAdvanced { run_id, .. }
            | LocflowEvent::RunFinalized { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast bus for [`LocflowEvent`]s
///
/// Cloning is cheap; all clones share the same channel. Slow subscribers that
/// fall more than `capacity` events behind lose the oldest events.
///
/// # Examples
///
/// ```
/// use locflow_common::events::EventBus;
///
/// let event_bus = EventBus::new(100);
/// let _rx = event_bus.subscribe();
/// assert_eq!(event_bus.subscriber_count(), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LocflowEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LocflowEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LocflowEvent,
    ) -> Result<usize, broadcast::error::SendError<LocflowEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LocflowEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
