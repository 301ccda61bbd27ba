//! Review phase identity
//!
//! Phases are traversed strictly forward:
//! CULTURAL → REGULATORY → QUALITY, followed by final consolidation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Cultural adaptation review (advisory scores)
    Cultural,
    /// Regulatory compliance review (hard gate on high risk)
    Regulatory,
    /// Quality assurance review (final human call)
    Quality,
}

impl Phase {
    /// Phase sequence in traversal order
    pub const ALL: [Phase; 3] = [Phase::Cultural, Phase::Regulatory, Phase::Quality];

    /// Wire name used in URLs, events and provider requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Cultural => "cultural",
            Phase::Regulatory => "regulatory",
            Phase::Quality => "quality",
        }
    }

    /// Position in [`Phase::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Phase::Cultural => 0,
            Phase::Regulatory => 1,
            Phase::Quality => 2,
        }
    }

    /// Following phase, `None` after Quality
    pub fn next(&self) -> Option<Phase> {
        Phase::ALL.get(self.index() + 1).copied()
    }

    /// Phases from this one to the end of the sequence (inclusive)
    pub fn this_and_later(&self) -> &'static [Phase] {
        &Phase::ALL[self.index()..]
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cultural" => Ok(Phase::Cultural),
            "regulatory" => Ok(Phase::Regulatory),
            "quality" => Ok(Phase::Quality),
            other => Err(format!("Unknown phase: {}", other)),
        }
    }
}

/// Per-phase segment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    /// Entered the phase, not yet analyzed
    Pending,
    /// Analyzed or edited, awaiting sign-off
    InProgress,
    /// Approved for this phase
    Complete,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::InProgress => "in-progress",
            PhaseStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
