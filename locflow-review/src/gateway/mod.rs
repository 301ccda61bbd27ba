//! Analysis gateway
//!
//! Single suspension point of the engine. Adapts calls to the external AI
//! analysis service and normalizes every outcome into an [`AnalysisReport`]:
//! - Provider success with a well-formed payload → validated report
//! - Network error, API error, malformed payload or timeout → fallback report
//!   (`overall_score = 50`, `risk_level = medium`, one "manual review" issue,
//!   `generated_by_fallback = true`)
//!
//! Provider errors never reach phase logic. One fallback substitution per
//! invocation; no automatic retry.

pub mod provider;
pub mod validate;

pub use provider::{AnalysisProvider, HttpAnalysisProvider, ProviderError, UnavailableProvider};
pub use validate::{parse_report, SchemaError};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use locflow_common::config::AnalysisServiceConfig;

use crate::models::{AnalysisReport, BrandContext, Phase, RunContext, Segment};

/// Request sent to the analysis service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub phase: Phase,
    pub segment_id: String,
    pub source_text: String,
    pub translation: String,
    pub target_market: String,
    pub asset_type: Option<String>,
    pub brand_context: BrandContext,
}

impl AnalysisRequest {
    pub fn new(phase: Phase, segment: &Segment, context: &RunContext) -> Self {
        Self {
            phase,
            segment_id: segment.id().to_string(),
            source_text: segment.source_text().to_string(),
            translation: segment.translation().to_string(),
            target_market: segment.target_market().to_string(),
            asset_type: context.asset_type.clone(),
            brand_context: context.brand_context.clone(),
        }
    }
}

/// Fallback-on-failure adapter over an [`AnalysisProvider`]
#[derive(Clone)]
pub struct AnalysisGateway {
    provider: Arc<dyn AnalysisProvider>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl AnalysisGateway {
    /// Create gateway
    ///
    /// # Arguments
    /// * `provider` - External analysis service
    /// * `timeout` - Per-call bound; exceeding it yields a fallback report
    /// * `max_concurrent` - Provider calls allowed in flight at once (min 1)
    pub fn new(provider: Arc<dyn AnalysisProvider>, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            provider,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Build the gateway from service configuration
    ///
    /// Without an endpoint (or if the HTTP client cannot be built) the gateway
    /// runs in degraded mode and every analysis yields a fallback report.
    pub fn from_config(config: &AnalysisServiceConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let provider: Arc<dyn AnalysisProvider> = match config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(endpoint) => match HttpAnalysisProvider::new(
                endpoint,
                config.api_key.clone(),
                timeout,
                config.requests_per_second,
            ) {
                Ok(provider) => {
                    tracing::info!(endpoint = %endpoint, "Analysis service client initialized");
                    Arc::new(provider)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to initialize analysis client, running degraded");
                    Arc::new(UnavailableProvider)
                }
            },
            None => {
                tracing::warn!(
                    "No analysis endpoint configured: every analysis will be a fallback report requiring manual review"
                );
                Arc::new(UnavailableProvider)
            }
        };

        Self::new(provider, timeout, config.max_concurrent)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Analyze one segment for one phase
    pub async fn analyze(&self, phase: Phase, segment: &Segment, context: &RunContext) -> AnalysisReport {
        self.analyze_request(&AnalysisRequest::new(phase, segment, context))
            .await
    }

    /// Run a prepared request; never fails
    pub async fn analyze_request(&self, request: &AnalysisRequest) -> AnalysisReport {
        let phase = request.phase;

        // Closed semaphore is never expected; treat like any other provider failure
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return self.fallback(request, "analysis permits closed"),
        };

        debug!(
            provider = self.provider.name(),
            segment_id = %request.segment_id,
            phase = %phase,
            "Invoking analysis provider"
        );

        let payload = match tokio::time::timeout(self.timeout, self.provider.analyze(request)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => return self.fallback(request, &e.to_string()),
            Err(_) => {
                return self.fallback(
                    request,
                    &format!("timed out after {} ms", self.timeout.as_millis()),
                )
            }
        };

        match parse_report(phase, payload) {
            Ok(report) => {
                debug!(
                    segment_id = %request.segment_id,
                    phase = %phase,
                    score = report.overall_score,
                    risk = ?report.risk_level,
                    issues = report.issues.len(),
                    "Analysis report validated"
                );
                report
            }
            Err(e) => self.fallback(request, &format!("malformed response: {}", e)),
        }
    }

    fn fallback(&self, request: &AnalysisRequest, cause: &str) -> AnalysisReport {
        warn!(
            provider = self.provider.name(),
            segment_id = %request.segment_id,
            phase = %request.phase,
            cause = %cause,
            "Analysis failed, substituting fallback report"
        );
        AnalysisReport::fallback(request.phase)
    }
}
