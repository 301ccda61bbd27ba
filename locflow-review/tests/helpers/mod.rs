//! Shared test fixtures
//!
//! Scripted analysis providers and run builders for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use locflow_review::gateway::{AnalysisGateway, AnalysisProvider, AnalysisRequest, ProviderError};
use locflow_review::models::{RunContext, SegmentImport};
use locflow_review::workflow::WorkflowOrchestrator;

/// Word that makes [`KeywordRiskProvider`] report high risk
pub const RISKY_WORD: &str = "guaranteed";

/// Reports high risk whenever the translation contains [`RISKY_WORD`],
/// low risk otherwise
#[derive(Default)]
pub struct KeywordRiskProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AnalysisProvider for KeywordRiskProvider {
    fn name(&self) -> &'static str {
        "keyword-risk"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if request.translation.to_lowercase().contains(RISKY_WORD) {
            Ok(json!({
                "overallScore": 35,
                "riskLevel": "high",
                "issues": [{
                    "text": "Absolute efficacy claim",
                    "severity": "critical",
                    "suggestion": "Remove the guarantee"
                }]
            }))
        } else {
            Ok(json!({ "overallScore": 92, "riskLevel": "low", "issues": [] }))
        }
    }
}

/// Always fails at the network level
pub struct FailingProvider;

#[async_trait]
impl AnalysisProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, ProviderError> {
        Err(ProviderError::Network("connection refused".to_string()))
    }
}

/// Answers after `delay`, well past the gateway timeout used in tests
pub struct SlowProvider {
    pub delay: Duration,
}

#[async_trait]
impl AnalysisProvider for SlowProvider {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "overallScore": 99, "riskLevel": "low", "issues": [] }))
    }
}

/// Returns a payload missing required fields
pub struct MalformedProvider;

#[async_trait]
impl AnalysisProvider for MalformedProvider {
    fn name(&self) -> &'static str {
        "malformed"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, ProviderError> {
        Ok(json!({ "verdict": "looks fine" }))
    }
}

pub fn gateway(provider: Arc<dyn AnalysisProvider>) -> AnalysisGateway {
    AnalysisGateway::new(provider, Duration::from_millis(200), 4)
}

/// Segments `s1..sN` carrying the given translations
pub fn imports(translations: &[&str]) -> Vec<SegmentImport> {
    translations
        .iter()
        .enumerate()
        .map(|(i, translation)| SegmentImport {
            id: format!("s{}", i + 1),
            source_text: format!("Source sentence {}.", i + 1),
            translation: translation.to_string(),
            segment_type: if i == 0 { "subject" } else { "body" }.to_string(),
            target_market: "de-DE".to_string(),
        })
        .collect()
}

pub fn run_with(provider: Arc<dyn AnalysisProvider>, translations: &[&str]) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new(imports(translations), RunContext::default(), gateway(provider))
        .expect("valid import")
}
