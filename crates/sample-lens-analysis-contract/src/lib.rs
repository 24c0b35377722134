#![warn(missing_docs)]
//! # sample-lens-analysis-contract
//!
//! ## Purpose
//! Defines the analysis/history service wire schema and maps it onto the
//! core data model.
//!
//! ## Responsibilities
//! - Encode analysis requests.
//! - Parse analysis, history, health, and validation-error bodies.
//! - Classify health scores into display bands.
//!
//! ## Data flow
//! Raw JSON body -> `parse_*` helpers -> core [`AnalysisResult`] /
//! [`HistoryEntry`] / [`FieldIssue`] values consumed by the client facade.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs to avoid borrowing from transient network
//! buffers.
//!
//! ## Error model
//! Invalid JSON, a missing `analysis` object, or out-of-contract values
//! return [`ContractError`]. A missing analysis maps to the `EmptyResult`
//! failure so callers never crash on a hollow success.
//!
//! ## Security and privacy notes
//! Request bodies carry the encoded image; this crate never logs them.

use sample_lens_core::{
    AnalysisFailure, AnalysisResult, FieldIssue, HealthScore, HistoryEntry, parse_timestamp,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of `POST /routes/analyze-stool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Base64 image body, optionally as a data URL.
    pub image: String,
}

/// Successful analysis response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Analysis object; absent or null bodies are treated as empty results.
    #[serde(default)]
    pub analysis: Option<AnalysisWire>,
}

/// Analysis object as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWire {
    /// Color description.
    pub color: String,
    /// Consistency description.
    pub consistency: String,
    /// Shape description.
    pub shape: String,
    /// Raw score; range is validated during mapping.
    pub health_score: i64,
    /// Potential concerns.
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Recommendations.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Successful history response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Entries, newest first as ordered by the store.
    #[serde(default)]
    pub entries: Vec<HistoryEntryWire>,
}

/// History entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntryWire {
    /// Entry identifier.
    pub id: String,
    /// ISO-8601 timestamp, with or without offset.
    pub date: String,
    /// Embedded analysis.
    pub analysis: AnalysisWire,
}

/// Health-check response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Free-form status string.
    pub status: String,
}

/// `422` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpValidationError {
    /// Individual problems.
    #[serde(default)]
    pub detail: Vec<ValidationErrorWire>,
}

/// One validation problem as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorWire {
    /// Field path; segments are names or list indices.
    pub loc: Vec<LocSegment>,
    /// Message.
    pub msg: String,
    /// Error category.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Segment of a validation error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocSegment {
    /// Field name.
    Name(String),
    /// List index.
    Index(u64),
}

impl std::fmt::Display for LocSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Display band derived from the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBand {
    /// Score 7-10.
    Healthy,
    /// Score 4-6.
    Fair,
    /// Score 1-3.
    Poor,
}

impl ScoreBand {
    /// Label shown next to the score.
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

/// Maps a health score to its display band.
pub fn score_band(score: HealthScore) -> ScoreBand {
    match score.value() {
        7.. => ScoreBand::Healthy,
        4..=6 => ScoreBand::Fair,
        _ => ScoreBand::Poor,
    }
}

/// Serializes an analysis request body.
///
/// # Errors
/// Returns [`ContractError::Decode`] if JSON encoding fails.
pub fn encode_analysis_request(image_base64: &str) -> Result<String, ContractError> {
    serde_json::to_string(&AnalysisRequest {
        image: image_base64.to_string(),
    })
    .map_err(ContractError::Decode)
}

/// Parses a successful analysis body into a core result.
///
/// # Errors
/// Returns [`ContractError::MissingAnalysis`] when `analysis` is absent or
/// null, [`ContractError::Decode`] for invalid JSON, and
/// [`ContractError::InvalidContract`] for out-of-range values.
pub fn parse_analysis_response(raw: &str) -> Result<AnalysisResult, ContractError> {
    let parsed: AnalysisResponse = serde_json::from_str(raw).map_err(ContractError::Decode)?;
    let wire = parsed.analysis.ok_or(ContractError::MissingAnalysis)?;
    analysis_from_wire(wire)
}

/// Parses a successful history body into core entries, preserving order.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON and
/// [`ContractError::InvalidContract`] when an entry has a blank id, an
/// unparsable date, or an out-of-range score.
pub fn parse_history_response(raw: &str) -> Result<Vec<HistoryEntry>, ContractError> {
    let parsed: HistoryResponse = serde_json::from_str(raw).map_err(ContractError::Decode)?;

    parsed
        .entries
        .into_iter()
        .map(|wire| {
            let recorded_at = parse_timestamp(&wire.date).map_err(|error| {
                ContractError::InvalidContract(format!("entry {}: {error}", wire.id))
            })?;
            let analysis = analysis_from_wire(wire.analysis)?;
            HistoryEntry::new(wire.id, recorded_at, analysis)
                .map_err(|error| ContractError::InvalidContract(error.to_string()))
        })
        .collect()
}

/// Parses a health-check body.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON.
pub fn parse_health_response(raw: &str) -> Result<HealthResponse, ContractError> {
    serde_json::from_str(raw).map_err(ContractError::Decode)
}

/// Parses a `422` body into field issues.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON.
pub fn parse_validation_error(raw: &str) -> Result<Vec<FieldIssue>, ContractError> {
    let parsed: HttpValidationError = serde_json::from_str(raw).map_err(ContractError::Decode)?;
    Ok(parsed
        .detail
        .into_iter()
        .map(|issue| FieldIssue {
            location: issue.loc.iter().map(ToString::to_string).collect(),
            message: issue.msg,
            category: issue.kind,
        })
        .collect())
}

/// Extracts a plain-string `detail` from generic error bodies, if present.
pub fn error_detail(raw: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Detail {
        detail: String,
    }

    serde_json::from_str::<Detail>(raw)
        .ok()
        .map(|body| body.detail)
}

fn analysis_from_wire(wire: AnalysisWire) -> Result<AnalysisResult, ContractError> {
    let raw_score = u8::try_from(wire.health_score).map_err(|_| {
        ContractError::InvalidContract(format!(
            "health_score {} is outside 1..=10",
            wire.health_score
        ))
    })?;
    let health_score = HealthScore::new(raw_score)
        .map_err(|error| ContractError::InvalidContract(error.to_string()))?;

    Ok(AnalysisResult {
        color: wire.color,
        consistency: wire.consistency,
        shape: wire.shape,
        health_score,
        concerns: wire.concerns,
        recommendations: wire.recommendations,
    })
}

/// Analysis contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("contract decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Success body without an analysis object.
    #[error("response has no analysis object")]
    MissingAnalysis,
    /// Parsed payload violates contract invariants.
    #[error("contract violation: {0}")]
    InvalidContract(String),
}

impl From<ContractError> for AnalysisFailure {
    fn from(error: ContractError) -> Self {
        match error {
            ContractError::MissingAnalysis => AnalysisFailure::EmptyResult,
            other => AnalysisFailure::MalformedResponse(other.to_string()),
        }
    }
}
