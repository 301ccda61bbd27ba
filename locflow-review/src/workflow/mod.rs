//! Review workflow: phase controllers, in-flight analysis tracking and the
//! run orchestrator

pub mod in_flight;
pub mod orchestrator;
pub mod phase_controller;

pub use in_flight::{AnalysisTicket, InFlightRegistry};
pub use orchestrator::{RunSnapshot, WorkflowOrchestrator};
pub use phase_controller::{
    AdvisoryGate, AnalysisRequiredGate, ApprovalGate, GateDecision, PhaseController, RiskGate,
};
