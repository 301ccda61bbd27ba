//! Schema check for provider payloads
//!
//! Required fields:
//! - `overallScore`: number in 0..=100 (all phases)
//! - `riskLevel`: low | medium | high (Regulatory, Quality)
//! - `issues`: array (Cultural; optional elsewhere)
//!
//! Issue entries may be plain strings or objects carrying `text`,
//! `description` or `issue`. Unrecognized top-level fields are kept in
//! [`AnalysisReport::details`].

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{AnalysisReport, Issue, IssueSeverity, Phase, RiskLevel};

const SCORE_KEYS: [&str; 2] = ["overallScore", "overall_score"];
const RISK_KEYS: [&str; 2] = ["riskLevel", "risk_level"];
const ISSUES_KEY: &str = "issues";
const IGNORED_KEYS: [&str; 2] = ["generatedByFallback", "generated_by_fallback"];

/// Malformed provider payload
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {field} has invalid value: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Validate a provider payload and build the report
pub fn parse_report(phase: Phase, payload: Value) -> Result<AnalysisReport, SchemaError> {
    let Value::Object(mut object) = payload else {
        return Err(SchemaError::NotAnObject);
    };

    let overall_score = take_any(&mut object, &SCORE_KEYS)
        .ok_or(SchemaError::MissingField("overallScore"))
        .and_then(parse_score)?;

    let risk_level = match take_any(&mut object, &RISK_KEYS) {
        Some(value) => Some(parse_risk(value)?),
        None if requires_risk(phase) => return Err(SchemaError::MissingField("riskLevel")),
        None => None,
    };

    let issues = match object.remove(ISSUES_KEY) {
        Some(value) => parse_issues(value)?,
        None if phase == Phase::Cultural => return Err(SchemaError::MissingField("issues")),
        None => Vec::new(),
    };

    for key in IGNORED_KEYS {
        object.remove(key);
    }

    Ok(AnalysisReport {
        phase,
        overall_score,
        risk_level,
        issues,
        generated_by_fallback: false,
        generated_at: Utc::now(),
        details: object,
    })
}

fn requires_risk(phase: Phase) -> bool {
    matches!(phase, Phase::Regulatory | Phase::Quality)
}

fn take_any(object: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| object.remove(*key))
}

fn parse_score(value: Value) -> Result<f64, SchemaError> {
    let score = value.as_f64().ok_or_else(|| SchemaError::InvalidField {
        field: "overallScore",
        reason: format!("expected number, got {}", value),
    })?;

    if !(0.0..=100.0).contains(&score) {
        return Err(SchemaError::InvalidField {
            field: "overallScore",
            reason: format!("{} outside 0-100", score),
        });
    }

    Ok(score)
}

fn parse_risk(value: Value) -> Result<RiskLevel, SchemaError> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got {}", value))
        .and_then(|s| s.parse::<RiskLevel>())
        .map_err(|reason| SchemaError::InvalidField {
            field: "riskLevel",
            reason,
        })
}

fn parse_issues(value: Value) -> Result<Vec<Issue>, SchemaError> {
    let Value::Array(entries) = value else {
        return Err(SchemaError::InvalidField {
            field: "issues",
            reason: "expected array".to_string(),
        });
    };

    entries.into_iter().map(parse_issue).collect()
}

fn parse_issue(entry: Value) -> Result<Issue, SchemaError> {
    match entry {
        Value::String(text) => Ok(Issue::new(text)),
        Value::Object(fields) => {
            let text = ["text", "description", "issue"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .ok_or_else(|| SchemaError::InvalidField {
                    field: "issues",
                    reason: "issue object without text".to_string(),
                })?;

            let string_field = |keys: &[&str]| {
                keys.iter()
                    .find_map(|key| fields.get(*key).and_then(Value::as_str))
                    .map(str::to_string)
            };

            Ok(Issue {
                text: text.to_string(),
                severity: string_field(&["severity"])
                    .and_then(|s| s.parse::<IssueSeverity>().ok()),
                suggestion: string_field(&["suggestion", "recommendation"]),
                category: string_field(&["category", "type"]),
            })
        }
        other => Err(SchemaError::InvalidField {
            field: "issues",
            reason: format!("unsupported issue entry: {}", other),
        }),
    }
}
