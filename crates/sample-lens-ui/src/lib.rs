#![warn(missing_docs)]
//! # sample-lens-ui
//!
//! ## Purpose
//! Defines the presentation-facing state model for `sample-lens`.
//!
//! ## Responsibilities
//! - Project the analysis session into preview, phase, status, and result
//!   views.
//! - Keep transient error toasts with a fixed auto-dismiss deadline.
//! - Project the history controller into rows, empty and error states, and
//!   pagination controls.
//!
//! ## Data flow
//! App orchestration applies controller changes to [`UiState`] and calls
//! [`history_view`] whenever the history list or page changes.
//!
//! ## Ownership and lifetimes
//! View models own their strings so a renderer can hold them across
//! controller mutations.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Failures arrive
//! as [`AnalysisFailure`] values and become toast or banner text.
//!
//! ## Security and privacy notes
//! Only the preview data URL and analysis text are projected; the submitted
//! payload never reaches the view layer.

use sample_lens_analysis_contract::{ScoreBand, score_band};
use sample_lens_core::{AnalysisFailure, AnalysisResult, HistoryEntry};
use sample_lens_history::HistoryController;
use sample_lens_session::{SessionController, SessionState};
use time::UtcOffset;
use time::macros::format_description;

/// How long an error toast stays visible.
pub const TOAST_DISMISS_MS: u64 = 5_000;

/// Transient error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Text shown to the user.
    pub message: String,
    /// Time after which the toast is removed.
    pub expires_at_ms: u64,
}

/// Display form of an analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    /// Labelled attributes in display order.
    pub metrics: Vec<(&'static str, String)>,
    /// Score as `N/10`.
    pub score_text: String,
    /// Score band.
    pub band: ScoreBand,
    /// Potential concerns.
    pub concerns: Vec<String>,
    /// Recommendations.
    pub recommendations: Vec<String>,
}

impl ResultView {
    /// Builds the view for `result`.
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            metrics: vec![
                ("Color", result.color.clone()),
                ("Consistency", result.consistency.clone()),
                ("Shape", result.shape.clone()),
            ],
            score_text: format!("{}/10", result.health_score.value()),
            band: score_band(result.health_score),
            concerns: result.concerns.clone(),
            recommendations: result.recommendations.clone(),
        }
    }
}

/// Aggregate analysis screen state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Preview of the selected image.
    pub preview: Option<String>,
    /// Session phase name.
    pub phase: &'static str,
    /// A submission is waiting on the service.
    pub in_flight: bool,
    /// Narrator status line while analyzing.
    pub status_line: Option<String>,
    /// Latest result.
    pub result: Option<ResultView>,
    /// Visible error toasts, oldest first.
    pub toasts: Vec<Toast>,
}

impl UiState {
    /// Creates idle UI state.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            preview: None,
            phase: SessionState::Idle.phase(),
            in_flight: false,
            status_line: None,
            result: None,
            toasts: Vec::new(),
        }
    }

    /// Mirrors the session controller.
    pub fn apply_session(&mut self, session: &SessionController) {
        self.preview = session.selected_preview().map(str::to_string);
        self.phase = session.state().phase();
        self.in_flight = session.state().is_in_flight();
        self.status_line = session.status_line().map(str::to_string);
        self.result = session.latest_result().map(ResultView::from_result);
    }

    /// Shows a toast for a failed analysis.
    pub fn notify_failure(&mut self, failure: &AnalysisFailure, now_ms: u64) {
        self.toasts.push(Toast {
            message: failure.user_message().to_string(),
            expires_at_ms: now_ms.saturating_add(TOAST_DISMISS_MS),
        });
    }

    /// Drops expired toasts; returns `true` if any were removed.
    pub fn prune_toasts(&mut self, now_ms: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.expires_at_ms > now_ms);
        before != self.toasts.len()
    }

    /// Returns `true` when a new image may be chosen.
    pub fn can_select_image(&self) -> bool {
        !self.in_flight
    }
}

/// One rendered history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    /// Entry id for the detail link.
    pub id: String,
    /// Recorded time in UTC.
    pub date_text: String,
    /// `Score: N/10`.
    pub score_text: String,
    /// Shape attribute.
    pub shape: String,
    /// Band label.
    pub band_label: &'static str,
}

impl HistoryRow {
    /// Builds the row for `entry`.
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            date_text: display_date(entry),
            score_text: format!("Score: {}/10", entry.analysis.health_score.value()),
            shape: entry.analysis.shape.clone(),
            band_label: score_band(entry.analysis.health_score).label(),
        }
    }
}

/// Pagination controls, shown only when there is more than one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationControls {
    /// `Page N of M`, one-based.
    pub label: String,
    /// Previous button enabled.
    pub previous_enabled: bool,
    /// Next button enabled.
    pub next_enabled: bool,
}

/// History screen state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    /// Rows on the current page.
    pub rows: Vec<HistoryRow>,
    /// Render the empty state instead of rows.
    pub empty: bool,
    /// Loading indicator.
    pub loading: bool,
    /// Error banner text.
    pub error_banner: Option<String>,
    /// Pagination controls.
    pub pagination: Option<PaginationControls>,
}

/// Projects the history controller into its screen state.
pub fn history_view(history: &HistoryController) -> HistoryView {
    let page = history.view();
    let pagination = (page.total_pages > 1).then(|| PaginationControls {
        label: format!("Page {} of {}", page.page + 1, page.total_pages),
        previous_enabled: page.has_previous,
        next_enabled: page.has_next,
    });

    HistoryView {
        rows: page.entries.iter().map(HistoryRow::from_entry).collect(),
        empty: page.is_empty(),
        loading: history.is_loading(),
        error_banner: history
            .error()
            .map(|_| "Could not load history. Showing the last loaded entries.".to_string()),
        pagination,
    }
}

fn display_date(entry: &HistoryEntry) -> String {
    entry
        .recorded_at
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute] UTC"
        ))
        .unwrap_or_else(|_| "unknown date".to_string())
}

#[cfg(test)]
mod tests {
    //! Unit tests for view projections.

    use sample_lens_core::{HealthScore, ImagePayload, parse_timestamp};
    use sample_lens_imaging::{CropRegion, PreparedImage};

    use super::*;

    fn result(score: u8) -> AnalysisResult {
        AnalysisResult {
            color: "brown".to_string(),
            consistency: "soft".to_string(),
            shape: "Type 4".to_string(),
            health_score: HealthScore::new(score).expect("valid score"),
            concerns: vec!["low fiber".to_string()],
            recommendations: vec!["eat greens".to_string()],
        }
    }

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
    fn result_view_formats_score_and_band() {
        let view = ResultView::from_result(&result(8));
        assert_eq!(view.score_text, "8/10");
        assert_eq!(view.band, ScoreBand::Healthy);
        assert_eq!(view.metrics[2], ("Shape", "Type 4".to_string()));
    }

    #[test]
    fn session_projection_tracks_phase_and_status() {
        let mut session = SessionController::default();
        let mut ui = UiState::new("0.1.0");

        let work = session.submit(prepared());
        session.mark_request_sent(work.ticket, 0);
        ui.apply_session(&session);
        assert_eq!(ui.phase, "analyzing");
        assert!(ui.status_line.is_some());
        assert!(!ui.can_select_image());

        session.complete(work.ticket, Ok(result(5)));
        ui.apply_session(&session);
        assert_eq!(ui.phase, "succeeded");
        assert!(ui.can_select_image());
        assert_eq!(ui.status_line, None);
        assert_eq!(ui.result.as_ref().map(|r| r.band), Some(ScoreBand::Fair));
    }

    #[test]
    fn image_selection_follows_in_flight_state_not_phase_text() {
        let mut session = SessionController::default();
        let mut ui = UiState::new("0.1.0");
        assert!(ui.can_select_image());

        let work = session.submit(prepared());
        ui.apply_session(&session);
        assert!(ui.in_flight);
        assert!(!ui.can_select_image());

        ui.phase = "renamed";
        assert!(!ui.can_select_image());

        session.complete(work.ticket, Err(AnalysisFailure::EmptyResult));
        ui.apply_session(&session);
        assert!(!ui.in_flight);
        assert!(ui.can_select_image());

        session.submit(prepared());
        session.reset();
        ui.apply_session(&session);
        assert!(ui.can_select_image());
    }

    #[test]
    fn toasts_expire_after_five_seconds() {
        let mut ui = UiState::new("0.1.0");
        ui.notify_failure(&AnalysisFailure::EmptyResult, 1_000);
        assert!(!ui.prune_toasts(5_999));
        assert_eq!(ui.toasts.len(), 1);
        assert!(ui.prune_toasts(6_000));
        assert!(ui.toasts.is_empty());
    }

    #[test]
    fn preparation_failure_keeps_existing_preview() {
        let mut ui = UiState::new("0.1.0");
        ui.preview = Some("data:image/jpeg;base64,AAAA".to_string());
        ui.notify_failure(&AnalysisFailure::InvalidInput("pdf".to_string()), 0);
        assert_eq!(ui.preview.as_deref(), Some("data:image/jpeg;base64,AAAA"));
        assert_eq!(ui.toasts[0].message, "Please select a valid image file.");
    }

    #[test]
    fn history_view_shows_rows_pagination_and_error() {
        let mut history = HistoryController::default();
        let entries: Vec<HistoryEntry> = (0..12)
            .map(|index| {
                HistoryEntry::new(
                    format!("id-{index}"),
                    parse_timestamp("2024-01-15T10:30:00Z").expect("timestamp parses"),
                    result(3),
                )
                .expect("entry should build")
            })
            .collect();
        let ticket = history.begin_load();
        history.complete_load(&ticket, Ok(entries));

        let view = history_view(&history);
        assert_eq!(view.rows.len(), 10);
        assert_eq!(view.rows[0].score_text, "Score: 3/10");
        assert_eq!(view.rows[0].band_label, "Poor");
        assert_eq!(view.rows[0].date_text, "2024-01-15 10:30 UTC");
        assert_eq!(
            view.pagination.as_ref().map(|p| p.label.as_str()),
            Some("Page 1 of 2")
        );

        let retry = history.begin_load();
        history.complete_load(&retry, Err(AnalysisFailure::Transport("down".to_string())));
        let view = history_view(&history);
        assert_eq!(view.rows.len(), 10);
        assert!(view.error_banner.is_some());
    }

    #[test]
    fn empty_history_renders_empty_state_without_pagination() {
        let history = HistoryController::default();
        let view = history_view(&history);
        assert!(view.empty);
        assert!(view.rows.is_empty());
        assert_eq!(view.pagination, None);
    }
}
