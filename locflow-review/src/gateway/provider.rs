//! External AI analysis providers
//!
//! A provider returns the raw JSON payload for one analysis request. Schema
//! checking and failure handling live in the gateway, so providers report
//! every problem as a [`ProviderError`].

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::AnalysisRequest;

/// User-Agent header sent to the analysis service
const USER_AGENT: &str = concat!("locflow-review/", env!("CARGO_PKG_VERSION"));

/// Provider failure
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body was not JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),

    /// No provider configured
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),
}

/// Black-box AI analysis service
///
/// # Example
/// ```rust,ignore
/// struct Scripted;
///
/// #[async_trait::async_trait]
/// impl AnalysisProvider for Scripted {
///     fn name(&self) -> &'static str { "scripted" }
///
///     async fn analyze(&self, _request: &AnalysisRequest) -> Result<serde_json::Value, ProviderError> {
///         Ok(serde_json::json!({ "overallScore": 90, "riskLevel": "low", "issues": [] }))
///     }
/// }
/// ```
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Run one analysis and return the provider's raw JSON payload
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, ProviderError>;
}

/// HTTP client for the AI analysis service
///
/// POSTs the request as JSON to `<endpoint>/analyze/<phase>`. Requests are
/// rate limited client-side.
pub struct HttpAnalysisProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl HttpAnalysisProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    fn url_for(&self, request: &AnalysisRequest) -> String {
        format!("{}/analyze/{}", self.endpoint, request.phase.as_str())
    }
}

#[async_trait]
impl AnalysisProvider for HttpAnalysisProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, ProviderError> {
        self.rate_limiter.until_ready().await;

        let url = self.url_for(request);
        debug!(
            url = %url,
            segment_id = %request.segment_id,
            "Sending analysis request"
        );

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

/// Provider used when no analysis service is configured
///
/// Every call fails, so every report is a fallback report.
#[derive(Debug, Default)]
pub struct UnavailableProvider;

#[async_trait]
impl AnalysisProvider for UnavailableProvider {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<serde_json::Value, ProviderError> {
        Err(ProviderError::Unavailable(
            "no analysis endpoint configured".to_string(),
        ))
    }
}
