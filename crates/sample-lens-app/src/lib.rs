#![warn(missing_docs)]
//! # sample-lens-app
//!
//! ## Purpose
//! Orchestrates preprocessing, the analysis session, history, and UI state
//! for `sample-lens`.
//!
//! ## Responsibilities
//! - Load runtime configuration from the environment with safe fallbacks.
//! - Run remote calls on worker threads and feed their outcomes back to the
//!   owning controllers as discrete events.
//! - Reload history whenever its filter or page changes.
//! - Provide log-safe helpers for payload-bearing strings.
//!
//! ## Data flow
//! Selected file -> [`select_image`] -> [`AnalysisRuntime::submit`] -> worker
//! thread -> channel -> [`AnalysisRuntime::pump`] -> session controller -> UI
//! projection. History follows the same shape through [`HistoryRuntime`].
//!
//! ## Ownership and lifetimes
//! Each runtime owns its controller and both ends of its event channel. Worker
//! threads own only a cloned sender, an `Arc` of the API, and the request
//! payload, so nothing they hold can mutate controller state directly.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Remote failures never
//! surface here; they become controller state and UI toasts or banners.
//!
//! ## Security and privacy notes
//! - Image payloads are logged by fingerprint only.
//! - Non-HTTPS endpoints are accepted for local development but logged as a
//!   warning.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use sample_lens_client::{
    AnalysisApi, ApiError, HttpAnalysisApi, HttpTransport, ReqwestTransport, validate_base_url,
};
use sample_lens_core::{
    AnalysisFailure, AnalysisResult, CoreError, FilterPatch, HistoryEntry, HistoryFilter,
};
use sample_lens_history::{
    DEFAULT_PAGE_SIZE, HistoryController, HistoryError, HistoryTicket, LoadResolution,
};
use sample_lens_imaging::{ImagingError, PreparedImage, RawImageFile, prepare_image};
use sample_lens_narrator::{
    DEFAULT_STEP_DURATION_MS, NarratorConfig, NarratorError, ProgressNarrator,
};
use sample_lens_session::{RequestTicket, Resolution, SessionController};
use sample_lens_ui::{HistoryView, UiState, history_view};
use thiserror::Error;
use time::Date;
use tracing::{info, warn};
use url::Url;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("SAMPLE_LENS_VERSION");

/// Base URL of the analysis service.
pub const API_URL_ENV: &str = "SAMPLE_LENS_API_URL";
/// Narrator step duration in milliseconds.
pub const NARRATOR_STEP_ENV: &str = "SAMPLE_LENS_NARRATOR_STEP_MS";
/// History entries per page.
pub const HISTORY_PAGE_SIZE_ENV: &str = "SAMPLE_LENS_HISTORY_PAGE_SIZE";
/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "SAMPLE_LENS_REQUEST_TIMEOUT_SECS";

/// Service address used when none is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
/// Request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Analysis service base URL.
    pub api_base_url: String,
    /// Narrator step duration.
    pub narrator_step_ms: u64,
    /// History entries per page.
    pub history_page_size: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            narrator_step_ms: DEFAULT_STEP_DURATION_MS,
            history_page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// Semantics:
    /// - Unset => default.
    /// - Unparsable, zero, or (for the URL) invalid => default plus a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = match lookup(API_URL_ENV) {
            Some(raw) => match validate_base_url(raw.trim()) {
                Ok(_) => raw.trim().to_string(),
                Err(error) => {
                    warn!(
                        stage = "config",
                        action = "fallback",
                        key = API_URL_ENV,
                        error = %error,
                        "invalid setting; using default"
                    );
                    DEFAULT_API_URL.to_string()
                }
            },
            None => DEFAULT_API_URL.to_string(),
        };

        Self {
            api_base_url,
            narrator_step_ms: positive_setting(
                lookup(NARRATOR_STEP_ENV),
                NARRATOR_STEP_ENV,
                DEFAULT_STEP_DURATION_MS,
            ),
            history_page_size: positive_setting(
                lookup(HISTORY_PAGE_SIZE_ENV),
                HISTORY_PAGE_SIZE_ENV,
                DEFAULT_PAGE_SIZE,
            ),
            request_timeout: Duration::from_secs(positive_setting(
                lookup(REQUEST_TIMEOUT_ENV),
                REQUEST_TIMEOUT_ENV,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        }
    }

    /// Builds the narrator for this configuration.
    ///
    /// # Errors
    /// Returns [`AppError::Narrator`] when the step duration is zero.
    pub fn narrator(&self) -> Result<ProgressNarrator, AppError> {
        let config = NarratorConfig::with_step_duration(self.narrator_step_ms)?;
        Ok(ProgressNarrator::new(config))
    }
}

fn positive_setting<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Default + PartialEq + Copy + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => value,
        _ => {
            warn!(
                stage = "config",
                action = "fallback",
                key,
                value = %raw,
                default = %default,
                "invalid setting; using default"
            );
            default
        }
    }
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Builds the HTTP-backed analysis API for `config`.
///
/// # Errors
/// Returns [`AppError::Api`] when the HTTP client cannot be built or the base
/// URL is unusable.
pub fn build_api(config: &AppConfig) -> Result<Arc<dyn AnalysisApi>, AppError> {
    if !is_https_endpoint(&config.api_base_url) {
        warn!(
            stage = "config",
            action = "insecure_endpoint",
            endpoint = %config.api_base_url,
            "analysis service is not reached over https"
        );
    }

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    let api = HttpAnalysisApi::new(&config.api_base_url, transport)?;
    Ok(Arc::new(api))
}

/// Replaces the body of every `data:...;base64,` URL with its length.
pub fn redact_data_urls(input: &str) -> String {
    const MARKER: &str = ";base64,";

    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("data:") {
        let Some(marker) = rest[start..].find(MARKER) else {
            break;
        };
        let body_start = start + marker + MARKER.len();
        let body_len = rest[body_start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')))
            .unwrap_or(rest.len() - body_start);

        output.push_str(&rest[..body_start]);
        output.push_str(&format!("<redacted {body_len} chars>"));
        rest = &rest[body_start + body_len..];
    }
    output.push_str(rest);
    output
}

/// Preprocesses a user-selected file.
///
/// # Errors
/// Returns the [`AnalysisFailure::InvalidInput`] to show to the user; no
/// submission should follow.
pub fn select_image(file: RawImageFile<'_>) -> Result<PreparedImage, AnalysisFailure> {
    prepare_image(file).map_err(|error| {
        warn!(
            stage = "imaging",
            action = "rejected",
            source = ?file.source,
            error = %error,
            "selected file was rejected"
        );
        AnalysisFailure::from(&error)
    })
}

/// Milliseconds elapsed since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    /// Starts counting from now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Elapsed milliseconds.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

enum AnalysisEvent {
    RequestSent(RequestTicket),
    Completed(RequestTicket, Result<AnalysisResult, AnalysisFailure>),
}

/// Analysis session plus the workers serving it.
pub struct AnalysisRuntime {
    session: SessionController,
    ui: UiState,
    api: Arc<dyn AnalysisApi>,
    events_tx: Sender<AnalysisEvent>,
    events_rx: Receiver<AnalysisEvent>,
    stale_discards: u64,
}

impl AnalysisRuntime {
    /// Creates an idle runtime.
    pub fn new(api: Arc<dyn AnalysisApi>, narrator: ProgressNarrator) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            session: SessionController::new(narrator),
            ui: UiState::new(APP_VERSION),
            api,
            events_tx,
            events_rx,
            stale_discards: 0,
        }
    }

    /// Preprocesses `file` and submits it.
    ///
    /// A rejected file shows a toast and leaves the session untouched;
    /// `Ok(None)` is returned in that case.
    ///
    /// # Errors
    /// Returns [`AppError::Worker`] when the request thread cannot start.
    pub fn select_file(
        &mut self,
        file: RawImageFile<'_>,
        now_ms: u64,
    ) -> Result<Option<RequestTicket>, AppError> {
        match select_image(file) {
            Ok(image) => self.submit(image, now_ms).map(Some),
            Err(failure) => {
                self.ui.notify_failure(&failure, now_ms);
                Ok(None)
            }
        }
    }

    /// Starts a session for `image` and issues exactly one remote request.
    ///
    /// # Errors
    /// Returns [`AppError::Worker`] when the request thread cannot start; the
    /// session is failed and a toast shown before returning.
    pub fn submit(
        &mut self,
        image: PreparedImage,
        now_ms: u64,
    ) -> Result<RequestTicket, AppError> {
        let work = self.session.submit(image);
        let ticket = work.ticket;
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("sample-lens-analysis-{}", ticket.sequence()))
            .spawn(move || {
                let _ = events.send(AnalysisEvent::RequestSent(ticket));
                let outcome = api
                    .analyze_image(&work.payload)
                    .map_err(AnalysisFailure::from);
                let _ = events.send(AnalysisEvent::Completed(ticket, outcome));
            });

        if let Err(error) = spawned {
            return Err(self.abandon_submission(ticket, error, now_ms));
        }

        self.ui.apply_session(&self.session);
        Ok(ticket)
    }

    fn abandon_submission(
        &mut self,
        ticket: RequestTicket,
        error: std::io::Error,
        now_ms: u64,
    ) -> AppError {
        let failure = AnalysisFailure::Transport(format!("request worker did not start: {error}"));
        if self.session.complete(ticket, Err(failure.clone())) == Resolution::Applied {
            self.ui.notify_failure(&failure, now_ms);
        }
        self.ui.apply_session(&self.session);
        AppError::Worker(error)
    }

    /// Applies every queued worker event, advances the narrator, and expires
    /// toasts. Returns the number of events applied.
    pub fn pump(&mut self, now_ms: u64) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event, now_ms);
            applied += 1;
        }
        self.session.tick(now_ms);
        self.ui.prune_toasts(now_ms);
        self.ui.apply_session(&self.session);
        applied
    }

    /// Waits up to `timeout` for one worker event, then pumps.
    pub fn pump_blocking(&mut self, timeout: Duration, clock: &MonotonicClock) -> usize {
        let mut applied = 0;
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event, clock.now_ms());
                applied += 1;
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
        }
        applied + self.pump(clock.now_ms())
    }

    /// Returns the session to idle; in-flight responses become stale.
    pub fn reset(&mut self) {
        self.session.reset();
        self.ui.apply_session(&self.session);
    }

    /// Session controller.
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// UI projection.
    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Number of late responses dropped so far.
    pub fn stale_discards(&self) -> u64 {
        self.stale_discards
    }

    fn apply(&mut self, event: AnalysisEvent, now_ms: u64) {
        match event {
            AnalysisEvent::RequestSent(ticket) => {
                self.session.mark_request_sent(ticket, now_ms);
            }
            AnalysisEvent::Completed(ticket, outcome) => {
                let failure = outcome.as_ref().err().cloned();
                match self.session.complete(ticket, outcome) {
                    Resolution::Applied => {
                        if let Some(failure) = failure {
                            self.ui.notify_failure(&failure, now_ms);
                        }
                    }
                    Resolution::Stale => self.stale_discards += 1,
                }
            }
        }
    }
}

type HistoryEvent = (HistoryTicket, Result<Vec<HistoryEntry>, AnalysisFailure>);

/// History controller plus the workers serving it.
pub struct HistoryRuntime {
    history: HistoryController,
    api: Arc<dyn AnalysisApi>,
    events_tx: Sender<HistoryEvent>,
    events_rx: Receiver<HistoryEvent>,
}

impl HistoryRuntime {
    /// Creates a runtime with nothing loaded.
    ///
    /// # Errors
    /// Returns [`AppError::History`] when `page_size == 0`.
    pub fn new(api: Arc<dyn AnalysisApi>, page_size: usize) -> Result<Self, AppError> {
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            history: HistoryController::new(page_size)?,
            api,
            events_tx,
            events_rx,
        })
    }

    /// Issues one fetch with the current filter.
    ///
    /// # Errors
    /// Returns [`AppError::Worker`] when the fetch thread cannot start; the
    /// load is recorded as failed before returning.
    pub fn reload(&mut self) -> Result<HistoryTicket, AppError> {
        let ticket = self.history.begin_load();
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("sample-lens-history-{}", ticket.sequence()))
            .spawn(move || {
                let outcome = api
                    .fetch_history(ticket.filter())
                    .map_err(AnalysisFailure::from);
                let _ = events.send((ticket, outcome));
            });

        if let Err(error) = spawned {
            let failure = AnalysisFailure::Transport(format!("history worker did not start: {error}"));
            self.history.complete_load(&ticket, Err(failure));
            return Err(AppError::Worker(error));
        }
        Ok(ticket)
    }

    /// Merges `patch` into the filter, returns to page one, and reloads.
    ///
    /// # Errors
    /// See [`Self::reload`].
    pub fn set_filter(&mut self, patch: FilterPatch) -> Result<HistoryTicket, AppError> {
        self.history.set_filter(patch);
        self.reload()
    }

    /// Sets both bounds from calendar days and reloads.
    ///
    /// # Errors
    /// Returns [`AppError::Core`] when a day cannot be turned into a bound,
    /// otherwise see [`Self::reload`].
    pub fn set_date_range(
        &mut self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<HistoryTicket, AppError> {
        let range = HistoryFilter::from_dates(start, end)?;
        self.set_filter(FilterPatch {
            start: Some(range.start),
            end: Some(range.end),
        })
    }

    /// Clears both bounds and reloads.
    ///
    /// # Errors
    /// See [`Self::reload`].
    pub fn clear_filters(&mut self) -> Result<HistoryTicket, AppError> {
        self.history.clear_filters();
        self.reload()
    }

    /// Jumps to `page` and reloads.
    ///
    /// # Errors
    /// See [`Self::reload`].
    pub fn set_page(&mut self, page: usize) -> Result<HistoryTicket, AppError> {
        self.history.set_page(page);
        self.reload()
    }

    /// Moves forward one page and reloads, if a next page exists.
    ///
    /// # Errors
    /// See [`Self::reload`].
    pub fn next_page(&mut self) -> Result<Option<HistoryTicket>, AppError> {
        if !self.history.next_page() {
            return Ok(None);
        }
        self.reload().map(Some)
    }

    /// Moves back one page and reloads, if a previous page exists.
    ///
    /// # Errors
    /// See [`Self::reload`].
    pub fn previous_page(&mut self) -> Result<Option<HistoryTicket>, AppError> {
        if !self.history.previous_page() {
            return Ok(None);
        }
        self.reload().map(Some)
    }

    /// Applies every queued fetch outcome; returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((ticket, outcome)) = self.events_rx.try_recv() {
            if self.history.complete_load(&ticket, outcome) == LoadResolution::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Pumps until no load is outstanding or `timeout` elapses.
    ///
    /// Returns `true` when the controller settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.history.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(stage = "history", action = "settle_timeout", "history load still pending");
                return false;
            }
            if let Ok((ticket, outcome)) = self.events_rx.recv_timeout(remaining) {
                self.history.complete_load(&ticket, outcome);
            }
        }
        info!(
            stage = "history",
            action = "settled",
            count = self.history.entries().len(),
            "history settled"
        );
        true
    }

    /// History controller.
    pub fn history(&self) -> &HistoryController {
        &self.history
    }

    /// Screen state for the current page.
    pub fn view(&self) -> HistoryView {
        history_view(&self.history)
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Client facade error.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    /// Image preprocessing error.
    #[error("imaging error: {0}")]
    Imaging(#[from] ImagingError),
    /// History configuration error.
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    /// Narrator configuration error.
    #[error("narrator error: {0}")]
    Narrator(#[from] NarratorError),
    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Worker thread could not be spawned.
    #[error("worker error: {0}")]
    Worker(std::io::Error),
    /// Input file could not be read.
    #[error("cannot read {path}: {source}")]
    Input {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    //! Unit tests for runtime failure paths that need private access.

    use sample_lens_client::SyntheticAnalysisService;
    use sample_lens_core::ImagePayload;
    use sample_lens_imaging::CropRegion;
    use sample_lens_session::SessionState;

    use super::*;

    fn prepared() -> PreparedImage {
        PreparedImage {
            payload: ImagePayload::new("QUJD", 512, 512).expect("payload should build"),
            preview_data_url: "data:image/jpeg;base64,QUJD".to_string(),
            source_width: 512,
            source_height: 512,
            crop: CropRegion {
                x: 0,
                y: 0,
                size: 512,
            },
        }
    }

    #[test]
    fn worker_start_failure_fails_session_and_shows_toast() {
        let api = Arc::new(SyntheticAnalysisService::with_scores(Vec::new()));
        let mut runtime = AnalysisRuntime::new(api, ProgressNarrator::default());
        let work = runtime.session.submit(prepared());

        let error = runtime.abandon_submission(
            work.ticket,
            std::io::Error::other("thread limit reached"),
            1_000,
        );

        assert!(matches!(error, AppError::Worker(_)));
        assert!(matches!(runtime.session().state(), SessionState::Failed(_)));
        assert_eq!(runtime.ui().phase, "failed");
        assert!(runtime.ui().can_select_image());
        assert_eq!(runtime.ui().toasts.len(), 1);
        assert_eq!(
            runtime.ui().toasts[0].message,
            "Failed to analyze image. Please try again."
        );
        assert_eq!(runtime.ui().toasts[0].expires_at_ms, 6_000);
    }

    #[test]
    fn worker_start_failure_for_superseded_ticket_adds_no_toast() {
        let api = Arc::new(SyntheticAnalysisService::with_scores(Vec::new()));
        let mut runtime = AnalysisRuntime::new(api, ProgressNarrator::default());
        let stale = runtime.session.submit(prepared()).ticket;
        runtime.session.submit(prepared());

        runtime.abandon_submission(stale, std::io::Error::other("thread limit reached"), 0);

        assert!(runtime.session().state().is_in_flight());
        assert!(runtime.ui().toasts.is_empty());
    }
}
