#![warn(missing_docs)]
//! # sample-lens-client
//!
//! ## Purpose
//! Typed boundary to the remote analysis and history services.
//!
//! ## Responsibilities
//! - Expose `analyze_image`, `fetch_history`, and `check_health` behind the
//!   [`AnalysisApi`] trait so controllers can run against fakes.
//! - Build endpoint URLs and history query strings.
//! - Classify HTTP outcomes into validation, status, and transport errors.
//! - Provide a deterministic synthetic service for tests and demos.
//! - Serve cached static assets with a fallback page when offline.
//!
//! ## Data flow
//! Session/history runtime -> [`AnalysisApi`] -> [`HttpAnalysisApi`] ->
//! [`HttpTransport`] (reqwest in production) -> contract parsing -> core types.
//!
//! ## Ownership and lifetimes
//! Clients hold `Arc<dyn HttpTransport>` so one transport can be shared by
//! worker threads without borrowing from the caller.
//!
//! ## Error model
//! Every failure is an [`ApiError`]; `From<ApiError> for AnalysisFailure`
//! maps it onto the user-facing taxonomy.
//!
//! ## Security and privacy notes
//! Request bodies contain the encoded image and are never logged; logs carry
//! the payload fingerprint and endpoint path only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sample_lens_analysis_contract::{
    ContractError, encode_analysis_request, error_detail, parse_analysis_response,
    parse_health_response, parse_history_response, parse_validation_error,
};
use sample_lens_core::{
    AnalysisFailure, AnalysisResult, FieldIssue, HealthScore, HistoryEntry, HistoryFilter,
    ImagePayload, format_timestamp,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use url::Url;

/// Relative path of the analysis endpoint.
pub const ANALYZE_PATH: &str = "routes/analyze-stool";

/// Relative path of the history endpoint.
pub const HISTORY_PATH: &str = "routes/history";

/// Relative path of the health-check endpoint.
pub const HEALTH_PATH: &str = "_healthz";

/// Version tag of the offline asset cache.
pub const ASSET_CACHE_VERSION: &str = "sample-analysis-v1";

/// Page served when neither cache nor network can answer.
pub const FALLBACK_PAGE_PATH: &str = "/fallback-analyzer.html";

/// Remote operations used by the session and history controllers.
pub trait AnalysisApi: Send + Sync {
    /// Submits one normalized image for analysis.
    ///
    /// # Errors
    /// Returns [`ApiError`] for transport, status, validation, and contract
    /// failures.
    fn analyze_image(&self, payload: &ImagePayload) -> Result<AnalysisResult, ApiError>;

    /// Fetches history entries matching `filter`.
    ///
    /// # Errors
    /// Returns [`ApiError`] for transport, status, validation, and contract
    /// failures.
    fn fetch_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, ApiError>;

    /// Reports whether the service is reachable and healthy.
    fn check_health(&self) -> ServiceHealth;
}

/// Binary service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    /// Health endpoint answered with a success status.
    Up,
    /// Health endpoint failed or was unreachable.
    Down,
}

/// HTTP method subset used by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`.
    Get,
    /// `POST` with a JSON body.
    Post,
}

/// Transport-level request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Fully resolved URL including query.
    pub url: Url,
    /// JSON body for `POST`.
    pub body: Option<String>,
}

/// Transport-level response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

/// Abstract transport used by [`HttpAnalysisApi`].
pub trait HttpTransport: Send + Sync {
    /// Executes one request.
    ///
    /// # Errors
    /// Returns [`ApiError::Transport`] when no HTTP response was received.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Blocking reqwest transport with a fixed request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Builds a transport.
    ///
    /// # Errors
    /// Returns [`ApiError::Transport`] when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::Transport(format!("http client build failed: {error}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(request.url.clone()),
            HttpMethod::Post => self.client.post(request.url.clone()),
        };
        let builder = match &request.body {
            Some(body) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone()),
            None => builder,
        };

        let response = builder
            .send()
            .map_err(|error| ApiError::Transport(error.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|error| ApiError::Transport(format!("response body read failed: {error}")))?;

        Ok(HttpResponse { status, body })
    }
}

/// HTTP implementation of [`AnalysisApi`].
#[derive(Clone)]
pub struct HttpAnalysisApi {
    base: Url,
    transport: Arc<dyn HttpTransport>,
}

impl HttpAnalysisApi {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidEndpoint`] for unparsable URLs, non-HTTP
    /// schemes, or URLs without a host.
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>) -> Result<Self, ApiError> {
        let base = validate_base_url(base_url)?;
        Ok(Self { base, transport })
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|error| ApiError::InvalidEndpoint(format!("cannot join {path}: {error}")))
    }

    fn send(&self, request: HttpRequest) -> Result<String, ApiError> {
        let path = request.url.path().to_string();
        let response = self.transport.execute(&request)?;
        info!(
            stage = "client",
            action = "response",
            path = %path,
            status = response.status,
            "service responded"
        );
        classify_response(response)
    }
}

impl AnalysisApi for HttpAnalysisApi {
    fn analyze_image(&self, payload: &ImagePayload) -> Result<AnalysisResult, ApiError> {
        let url = self.endpoint(ANALYZE_PATH)?;
        info!(
            stage = "client",
            action = "analyze_request",
            fingerprint = %payload.fingerprint(),
            encoded_len = payload.encoded_len(),
            "submitting image for analysis"
        );

        let body = encode_analysis_request(payload.as_base64()).map_err(ApiError::Contract)?;
        let raw = self.send(HttpRequest {
            method: HttpMethod::Post,
            url,
            body: Some(body),
        })?;
        parse_analysis_response(&raw).map_err(ApiError::Contract)
    }

    fn fetch_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, ApiError> {
        let mut url = self.endpoint(HISTORY_PATH)?;
        let query = history_query(filter)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let raw = self.send(HttpRequest {
            method: HttpMethod::Get,
            url,
            body: None,
        })?;
        parse_history_response(&raw).map_err(ApiError::Contract)
    }

    fn check_health(&self) -> ServiceHealth {
        let request = match self.endpoint(HEALTH_PATH) {
            Ok(url) => HttpRequest {
                method: HttpMethod::Get,
                url,
                body: None,
            },
            Err(error) => {
                warn!(stage = "client", action = "health", error = %error, "bad health url");
                return ServiceHealth::Down;
            }
        };

        match self.send(request) {
            Ok(raw) => {
                if let Ok(health) = parse_health_response(&raw) {
                    info!(stage = "client", action = "health", status = %health.status, "service up");
                }
                ServiceHealth::Up
            }
            Err(error) => {
                warn!(stage = "client", action = "health", error = %error, "service down");
                ServiceHealth::Down
            }
        }
    }
}

/// Validates and normalizes a service base URL.
///
/// A trailing slash is added so relative endpoint paths join beneath it.
///
/// # Errors
/// Returns [`ApiError::InvalidEndpoint`] for unparsable URLs, schemes other
/// than `http`/`https`, or URLs without a host.
pub fn validate_base_url(base_url: &str) -> Result<Url, ApiError> {
    let mut parsed = Url::parse(base_url.trim())
        .map_err(|error| ApiError::InvalidEndpoint(format!("invalid service url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidEndpoint(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ApiError::InvalidEndpoint(
            "service url has no host".to_string(),
        ));
    }

    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }

    Ok(parsed)
}

/// Builds `start_date`/`end_date` query pairs for a filter.
///
/// # Errors
/// Returns [`ApiError::InvalidFilter`] when a bound cannot be rendered.
pub fn history_query(filter: &HistoryFilter) -> Result<Vec<(&'static str, String)>, ApiError> {
    let mut pairs = Vec::with_capacity(2);
    if let Some(start) = filter.start {
        let rendered =
            format_timestamp(start).map_err(|error| ApiError::InvalidFilter(error.to_string()))?;
        pairs.push(("start_date", rendered));
    }
    if let Some(end) = filter.end {
        let rendered =
            format_timestamp(end).map_err(|error| ApiError::InvalidFilter(error.to_string()))?;
        pairs.push(("end_date", rendered));
    }
    Ok(pairs)
}

/// Classifies one HTTP response.
///
/// # Errors
/// - `422` -> [`ApiError::Validation`] (string details become one issue).
/// - other non-2xx -> [`ApiError::Status`] carrying the `detail` text.
pub fn classify_response(response: HttpResponse) -> Result<String, ApiError> {
    match response.status {
        200..=299 => Ok(response.body),
        422 => {
            let issues = parse_validation_error(&response.body).unwrap_or_else(|_| {
                vec![FieldIssue {
                    location: vec!["body".to_string()],
                    message: error_detail(&response.body)
                        .unwrap_or_else(|| "request rejected".to_string()),
                    category: "value_error".to_string(),
                }]
            });
            Err(ApiError::Validation(issues))
        }
        status => Err(ApiError::Status {
            status,
            detail: error_detail(&response.body).unwrap_or_else(|| "no detail".to_string()),
        }),
    }
}

/// Deterministic in-process service.
///
/// Analyses return scripted scores (cycling) and are recorded into an
/// in-memory history store that filters inclusively and orders newest first.
#[derive(Debug)]
pub struct SyntheticAnalysisService {
    scores: Vec<HealthScore>,
    calls: AtomicU64,
    history: Mutex<Vec<HistoryEntry>>,
}

impl SyntheticAnalysisService {
    /// Creates a service that cycles through `scores`.
    ///
    /// An empty list behaves like the service omitting the analysis.
    pub fn with_scores(scores: Vec<HealthScore>) -> Self {
        Self {
            scores,
            calls: AtomicU64::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Creates a service pre-populated with history entries.
    pub fn with_history(entries: Vec<HistoryEntry>) -> Self {
        Self {
            scores: Vec::new(),
            calls: AtomicU64::new(0),
            history: Mutex::new(entries),
        }
    }

    /// Builds the canned analysis returned for `score`.
    pub fn canned_result(score: HealthScore) -> AnalysisResult {
        AnalysisResult {
            color: "Medium brown".to_string(),
            consistency: "Soft and formed".to_string(),
            shape: "Type 4 - smooth sausage".to_string(),
            health_score: score,
            concerns: if score.value() < 4 {
                vec!["Consistency suggests dehydration".to_string()]
            } else {
                Vec::new()
            },
            recommendations: vec![
                "Drink water throughout the day".to_string(),
                "Include fiber-rich foods".to_string(),
            ],
        }
    }
}

impl AnalysisApi for SyntheticAnalysisService {
    fn analyze_image(&self, _payload: &ImagePayload) -> Result<AnalysisResult, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.scores.is_empty() {
            return Err(ApiError::Contract(ContractError::MissingAnalysis));
        }

        let score = self.scores[(call as usize) % self.scores.len()];
        let result = Self::canned_result(score);
        let entry = HistoryEntry::new(
            format!("synthetic-{call}"),
            OffsetDateTime::now_utc(),
            result.clone(),
        )
        .map_err(|error| ApiError::Transport(error.to_string()))?;

        self.history
            .lock()
            .map_err(|_| ApiError::Transport("synthetic history lock poisoned".to_string()))?
            .push(entry);
        Ok(result)
    }

    fn fetch_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, ApiError> {
        let history = self
            .history
            .lock()
            .map_err(|_| ApiError::Transport("synthetic history lock poisoned".to_string()))?;

        let mut matching: Vec<HistoryEntry> = history
            .iter()
            .filter(|entry| filter.contains(entry.recorded_at))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(matching)
    }

    fn check_health(&self) -> ServiceHealth {
        ServiceHealth::Up
    }
}

/// Where an asset response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOrigin {
    /// Served from the versioned cache.
    Cache,
    /// Fetched from the network.
    Network,
    /// Network failed; the fallback page was served.
    Fallback,
}

/// Versioned static-asset cache used only to serve pages while offline.
#[derive(Debug, Clone)]
pub struct OfflineAssetCache {
    version: String,
    assets: HashMap<String, Vec<u8>>,
}

impl OfflineAssetCache {
    /// Creates an empty cache with the given version tag.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            assets: HashMap::new(),
        }
    }

    /// Version tag the cache was created with.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Stores one asset.
    pub fn install(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(path.into(), bytes);
    }

    /// Cache-first lookup with network and fallback-page tiers.
    ///
    /// # Errors
    /// Returns the network error when the asset is not cached, the network
    /// fails, and no fallback page is installed.
    pub fn respond<F>(&self, path: &str, fetch: F) -> Result<(AssetOrigin, Vec<u8>), ApiError>
    where
        F: FnOnce() -> Result<Vec<u8>, ApiError>,
    {
        if let Some(bytes) = self.assets.get(path) {
            return Ok((AssetOrigin::Cache, bytes.clone()));
        }

        match fetch() {
            Ok(bytes) => Ok((AssetOrigin::Network, bytes)),
            Err(error) => match self.assets.get(FALLBACK_PAGE_PATH) {
                Some(page) => {
                    warn!(stage = "offline", action = "fallback", path, error = %error, "serving fallback page");
                    Ok((AssetOrigin::Fallback, page.clone()))
                }
                None => Err(error),
            },
        }
    }
}

impl Default for OfflineAssetCache {
    fn default() -> Self {
        Self::new(ASSET_CACHE_VERSION)
    }
}

/// Errors produced by the client facade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Base URL or endpoint path is unusable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Filter bound could not be rendered as ISO-8601.
    #[error("invalid history filter: {0}")]
    InvalidFilter(String),
    /// No HTTP response was received.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Service rejected the request shape (`422`).
    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<FieldIssue>),
    /// Service answered with a non-success status.
    #[error("service returned status {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `detail` text or placeholder.
        detail: String,
    },
    /// Success body violated the contract.
    #[error("contract failure: {0}")]
    Contract(#[from] ContractError),
}

impl From<ApiError> for AnalysisFailure {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Validation(issues) => AnalysisFailure::Validation(issues),
            ApiError::Contract(contract) => contract.into(),
            other => AnalysisFailure::Transport(other.to_string()),
        }
    }
}
