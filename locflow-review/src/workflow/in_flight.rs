//! In-flight analysis registry keyed by (segment, phase)
//!
//! At most one analysis per key may write its result. Registering a new
//! request cancels the previous one for the same key and bumps the
//! generation, so the last-issued request wins regardless of completion order.

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::models::Phase;

/// Handle held by an in-flight analysis
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub segment_id: String,
    pub phase: Phase,
    pub generation: u64,
    pub token: CancellationToken,
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    next_generation: u64,
    entries: HashMap<(String, Phase), Entry>,
}

impl InFlightRegistry {
    /// Register a new analysis, superseding any in flight for the same key
    pub fn register(&mut self, segment_id: &str, phase: Phase) -> AnalysisTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();

        let key = (segment_id.to_string(), phase);
        if let Some(previous) = self.entries.insert(
            key,
            Entry {
                generation,
                token: token.clone(),
            },
        ) {
            tracing::debug!(
                segment_id = %segment_id,
                phase = %phase,
                superseded_generation = previous.generation,
                "Superseding in-flight analysis"
            );
            previous.token.cancel();
        }

        AnalysisTicket {
            segment_id: segment_id.to_string(),
            phase,
            generation,
            token,
        }
    }

    /// Retire a ticket. Returns `true` if it was still current and may write
    /// its result.
    pub fn complete(&mut self, ticket: &AnalysisTicket) -> bool {
        let key = (ticket.segment_id.clone(), ticket.phase);
        match self.entries.get(&key) {
            Some(entry) if entry.generation == ticket.generation && !entry.token.is_cancelled() => {
                self.entries.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Cancel the analysis in flight for one key, if any
    pub fn cancel(&mut self, segment_id: &str, phase: Phase) -> bool {
        match self.entries.remove(&(segment_id.to_string(), phase)) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel everything in flight
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.token.cancel();
        }
        count
    }

    pub fn is_in_flight(&self, segment_id: &str, phase: Phase) -> bool {
        self.entries.contains_key(&(segment_id.to_string(), phase))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
