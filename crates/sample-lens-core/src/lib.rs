#![warn(missing_docs)]
//! # sample-lens-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `sample-lens` workspace.
//!
//! ## Responsibilities
//! - Represent analysis results with a validated 1-10 health score.
//! - Represent canonical image payloads and their log-safe fingerprints.
//! - Represent history entries and inclusive date-range filters.
//! - Define the failure taxonomy surfaced by the analysis session.
//!
//! ## Data flow
//! Imaging produces [`ImagePayload`] values, the session moves them into a
//! request, the client turns service responses into [`AnalysisResult`] and
//! [`HistoryEntry`] values, and failures are reported as [`AnalysisFailure`].
//!
//! ## Ownership and lifetimes
//! Every value owns its strings and buffers so results can cross the worker
//! channel without borrowing transient network buffers.
//!
//! ## Error model
//! Construction-time validation failures (score out of range, empty or
//! non-canonical payloads, unparsable timestamps) return [`CoreError`].
//!
//! ## Security and privacy notes
//! Image payloads describe a medical sample. Only [`ImagePayload::fingerprint`]
//! and byte counts are meant to reach logs, never the encoded bytes.
//!
//! ## Example
//! ```rust
//! use sample_lens_core::{HealthScore, HistoryFilter, parse_timestamp};
//!
//! let score = HealthScore::new(7).expect("score in range");
//! assert_eq!(score.value(), 7);
//!
//! let filter = HistoryFilter::between(
//!     Some(parse_timestamp("2024-01-01T00:00:00Z").unwrap()),
//!     Some(parse_timestamp("2024-01-31T23:59:59Z").unwrap()),
//! );
//! assert!(filter.contains(parse_timestamp("2024-01-15T08:00:00").unwrap()));
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Edge length in pixels of every normalized square image.
pub const CANONICAL_RESOLUTION: u32 = 512;

/// Lowest health score the service may report.
pub const HEALTH_SCORE_MIN: u8 = 1;

/// Highest health score the service may report.
pub const HEALTH_SCORE_MAX: u8 = 10;

/// Overall health score bounded to `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HealthScore(u8);

impl HealthScore {
    /// Creates a validated score.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidHealthScore`] outside `1..=10`.
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if !(HEALTH_SCORE_MIN..=HEALTH_SCORE_MAX).contains(&value) {
            return Err(CoreError::InvalidHealthScore(value));
        }
        Ok(Self(value))
    }

    /// Returns the raw score.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for HealthScore {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HealthScore> for u8 {
    fn from(score: HealthScore) -> Self {
        score.0
    }
}

/// Structured result returned by the remote analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Observed color description.
    pub color: String,
    /// Observed consistency (for example soft, hard, loose).
    pub consistency: String,
    /// Shape classification, usually a Bristol scale description.
    pub shape: String,
    /// Overall health score.
    pub health_score: HealthScore,
    /// Potential concerns in service order.
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Recommendations in service order.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Normalized square JPEG, base64 encoded, ready for submission.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    base64_jpeg: String,
    width: u32,
    height: u32,
}

impl ImagePayload {
    /// Wraps an encoded image produced by the preprocessing stage.
    ///
    /// A leading `data:<mime>;base64,` prefix is stripped so data URLs and
    /// bare base64 strings are accepted alike.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyPayload`] for blank input and
    /// [`CoreError::NonCanonicalPayload`] when the declared geometry is not
    /// [`CANONICAL_RESOLUTION`] square.
    pub fn new(encoded: impl Into<String>, width: u32, height: u32) -> Result<Self, CoreError> {
        if width != CANONICAL_RESOLUTION || height != CANONICAL_RESOLUTION {
            return Err(CoreError::NonCanonicalPayload { width, height });
        }

        let encoded = encoded.into();
        let base64_jpeg = strip_data_url_prefix(&encoded).trim().to_string();
        if base64_jpeg.is_empty() {
            return Err(CoreError::EmptyPayload);
        }

        Ok(Self {
            base64_jpeg,
            width,
            height,
        })
    }

    /// Returns the bare base64 body.
    pub fn as_base64(&self) -> &str {
        &self.base64_jpeg
    }

    /// Consumes the payload and returns the bare base64 body.
    pub fn into_base64(self) -> String {
        self.base64_jpeg
    }

    /// Payload width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Payload height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of the encoded body in bytes.
    pub fn encoded_len(&self) -> usize {
        self.base64_jpeg.len()
    }

    /// Short SHA-256 fingerprint used to reference the payload in logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.base64_jpeg.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("fingerprint", &self.fingerprint())
            .field("encoded_len", &self.encoded_len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Strips a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url_prefix(raw: &str) -> &str {
    if raw.starts_with("data:") {
        if let Some((_, body)) = raw.split_once(',') {
            return body;
        }
    }
    raw
}

/// One historical analysis record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Opaque identifier assigned by the history store.
    pub id: String,
    /// Time the analysis was recorded (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    /// Analysis captured at that time.
    pub analysis: AnalysisResult,
}

impl HistoryEntry {
    /// Creates a validated history entry.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyEntryId`] when `id` is blank.
    pub fn new(
        id: impl Into<String>,
        recorded_at: OffsetDateTime,
        analysis: AnalysisResult,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::EmptyEntryId);
        }
        Ok(Self {
            id,
            recorded_at,
            analysis,
        })
    }
}

/// Optional inclusive timestamp bounds for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryFilter {
    /// Inclusive lower bound.
    pub start: Option<OffsetDateTime>,
    /// Inclusive upper bound.
    pub end: Option<OffsetDateTime>,
}

impl HistoryFilter {
    /// Filter with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Filter with explicit bounds.
    pub fn between(start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Self {
        Self { start, end }
    }

    /// Builds a filter from calendar days.
    ///
    /// `start` maps to the first instant of its day and `end` to the last
    /// instant of its day, both in UTC, so a whole-day range stays inclusive.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTimestamp`] if the end-of-day instant cannot
    /// be represented.
    pub fn from_dates(start: Option<Date>, end: Option<Date>) -> Result<Self, CoreError> {
        Ok(Self {
            start: start.map(start_of_day),
            end: end.map(end_of_day).transpose()?,
        })
    }

    /// Returns `true` when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Returns `true` when `timestamp` lies inside the inclusive range.
    pub fn contains(&self, timestamp: OffsetDateTime) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp > end {
                return false;
            }
        }
        true
    }

    /// Returns a copy with `patch` merged over the current bounds.
    pub fn merged(&self, patch: &FilterPatch) -> Self {
        Self {
            start: patch.start.unwrap_or(self.start),
            end: patch.end.unwrap_or(self.end),
        }
    }
}

/// Partial filter update; untouched fields keep their current value.
///
/// `Some(None)` clears a bound, `None` leaves it as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterPatch {
    /// Replacement for the lower bound.
    pub start: Option<Option<OffsetDateTime>>,
    /// Replacement for the upper bound.
    pub end: Option<Option<OffsetDateTime>>,
}

impl FilterPatch {
    /// Patch that only replaces the lower bound.
    pub fn start(start: Option<OffsetDateTime>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Patch that only replaces the upper bound.
    pub fn end(end: Option<OffsetDateTime>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Patch that clears both bounds.
    pub fn clear() -> Self {
        Self {
            start: Some(None),
            end: Some(None),
        }
    }
}

/// One validation problem reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Path to the offending field (for example `body.image`).
    pub location: Vec<String>,
    /// Human-readable message.
    pub message: String,
    /// Machine category reported by the service.
    pub category: String,
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.location.join("."),
            self.message,
            self.category
        )
    }
}

/// Reason an analysis session or history fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisFailure {
    /// The selected file is not a decodable image.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The service rejected the request shape.
    #[error("request rejected: {}", join_issues(.0))]
    Validation(Vec<FieldIssue>),
    /// The service could not be reached or answered with an error status.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The service answered successfully without the expected data.
    #[error("service returned no analysis data")]
    EmptyResult,
    /// The service answered successfully with an undecodable body.
    #[error("malformed service response: {0}")]
    MalformedResponse(String),
}

impl AnalysisFailure {
    /// Message suitable for a transient toast.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "Please select a valid image file.",
            Self::Validation(_) => "The image could not be processed. Please try another photo.",
            Self::Transport(_) => "Failed to analyze image. Please try again.",
            Self::EmptyResult | Self::MalformedResponse(_) => {
                "The analysis service returned an unexpected response. Please try again."
            }
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses an ISO-8601 timestamp.
///
/// RFC 3339 values keep their offset. Naive values such as
/// `2024-01-15T10:30:00.123456` carry no offset and are read as UTC.
///
/// # Errors
/// Returns [`CoreError::InvalidTimestamp`] when no accepted layout matches.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, CoreError> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(parsed);
    }

    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|_| CoreError::InvalidTimestamp(raw.to_string()))
}

/// Parses a calendar day in `YYYY-MM-DD` form.
///
/// # Errors
/// Returns [`CoreError::InvalidTimestamp`] for any other layout.
pub fn parse_date(raw: &str) -> Result<Date, CoreError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| CoreError::InvalidTimestamp(raw.to_string()))
}

/// Formats a timestamp as RFC 3339.
///
/// # Errors
/// Returns [`CoreError::InvalidTimestamp`] when the value cannot be rendered
/// (for example a year outside `0..=9999`).
pub fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, CoreError> {
    timestamp
        .format(&Rfc3339)
        .map_err(|error| CoreError::InvalidTimestamp(error.to_string()))
}

fn start_of_day(date: Date) -> OffsetDateTime {
    date.midnight().assume_utc()
}

fn end_of_day(date: Date) -> Result<OffsetDateTime, CoreError> {
    date.with_hms_nano(23, 59, 59, 999_999_999)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|error| CoreError::InvalidTimestamp(error.to_string()))
}

/// Error type for core domain validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Score falls outside `1..=10`.
    #[error("health score {0} is outside 1..=10")]
    InvalidHealthScore(u8),
    /// Encoded payload is blank.
    #[error("image payload is empty")]
    EmptyPayload,
    /// Payload geometry differs from the canonical square.
    #[error("payload must be {CANONICAL_RESOLUTION}x{CANONICAL_RESOLUTION}, got {width}x{height}")]
    NonCanonicalPayload {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// History entry id is blank.
    #[error("history entry id is empty")]
    EmptyEntryId,
    /// Timestamp text is not ISO-8601.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for score validation, payloads, and filters.

    use super::*;

    #[test]
    fn health_score_rejects_out_of_range_values() {
        assert!(HealthScore::new(0).is_err());
        assert!(HealthScore::new(11).is_err());
        assert_eq!(HealthScore::new(10).expect("upper bound").value(), 10);
    }

    #[test]
    fn health_score_deserialization_enforces_range() {
        assert!(serde_json::from_str::<HealthScore>("4").is_ok());
        assert!(serde_json::from_str::<HealthScore>("42").is_err());
    }

    #[test]
    fn payload_strips_data_url_prefix() {
        let payload = ImagePayload::new("data:image/jpeg;base64,QUJD", 512, 512)
            .expect("payload should build");
        assert_eq!(payload.as_base64(), "QUJD");
    }

    #[test]
    fn payload_debug_hides_encoded_bytes() {
        let payload = ImagePayload::new("U0VDUkVU", 512, 512).expect("payload should build");
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("U0VDUkVU"));
        assert!(rendered.contains(&payload.fingerprint()));
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let parsed = parse_timestamp("2024-01-15T10:30:00.123456").expect("naive iso parses");
        assert_eq!(parsed.offset(), time::UtcOffset::UTC);
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn date_filter_end_is_inclusive_for_whole_day() {
        let filter = HistoryFilter::from_dates(
            Some(parse_date("2024-01-01").unwrap()),
            Some(parse_date("2024-01-31").unwrap()),
        )
        .expect("filter should build");

        assert!(filter.contains(parse_timestamp("2024-01-31T23:15:00Z").unwrap()));
        assert!(!filter.contains(parse_timestamp("2024-02-01T00:00:00Z").unwrap()));
    }

    #[test]
    fn patch_only_touches_named_bounds() {
        let start = parse_timestamp("2024-03-01T00:00:00Z").unwrap();
        let end = parse_timestamp("2024-03-31T00:00:00Z").unwrap();
        let filter = HistoryFilter::between(Some(start), None).merged(&FilterPatch::end(Some(end)));
        assert_eq!(filter, HistoryFilter::between(Some(start), Some(end)));
        assert!(filter.merged(&FilterPatch::clear()).is_unbounded());
    }
}
