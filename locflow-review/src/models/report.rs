//! Analysis report produced by the gateway for one segment in one phase

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Phase;

/// Score assigned to fallback reports
pub const FALLBACK_SCORE: f64 = 50.0;

/// Issue text carried by fallback reports
pub const FALLBACK_ISSUE_TEXT: &str = "Unable to verify — manual review required";

/// Regulatory/quality risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

/// Issue severity as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" | "info" => Ok(IssueSeverity::Low),
            "medium" | "moderate" | "warning" => Ok(IssueSeverity::Medium),
            "high" | "major" | "error" => Ok(IssueSeverity::High),
            "critical" | "blocker" => Ok(IssueSeverity::Critical),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Single finding in an analysis report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<IssueSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Issue {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: None,
            suggestion: None,
            category: None,
        }
    }
}

/// Validated analysis result for one segment in one phase
///
/// The engine only relies on `overall_score`, `risk_level`, `issues` and
/// `generated_by_fallback`; anything else the provider returned is kept in
/// `details` for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub phase: Phase,
    /// 0-100
    pub overall_score: f64,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Set when the provider failed and this report is a conservative substitute
    pub generated_by_fallback: bool,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisReport {
    /// Deterministic report substituted for any provider failure
    pub fn fallback(phase: Phase) -> Self {
        Self {
            phase,
            overall_score: FALLBACK_SCORE,
            risk_level: Some(RiskLevel::Medium),
            issues: vec![Issue::new(FALLBACK_ISSUE_TEXT)],
            generated_by_fallback: true,
            generated_at: Utc::now(),
            details: serde_json::Map::new(),
        }
    }
}
