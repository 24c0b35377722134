#![warn(missing_docs)]
//! # sample-lens-session
//!
//! ## Purpose
//! Owns the analysis session state machine and the latest-result store.
//!
//! ## Responsibilities
//! - Move a prepared image through `Idle -> Submitting -> Analyzing ->
//!   Succeeded | Failed`.
//! - Tag every submission with a monotonic sequence number and ignore
//!   responses whose tag is no longer current.
//! - Start the progress narrator on `Analyzing` and stop it on every exit.
//! - Keep exactly the latest successful result; clear it on failure or reset.
//!
//! ## Data flow
//! UI selection -> [`SessionController::submit`] -> [`SubmitTicket`] handed to
//! a worker -> [`SessionController::mark_request_sent`] ->
//! [`SessionController::complete`] with the worker outcome.
//!
//! ## Ownership and lifetimes
//! The controller is a plain owned value mutated only through its transition
//! methods. The image payload is moved into the ticket, so the controller
//! never retains it after hand-off.
//!
//! ## Error model
//! Transitions do not fail. Stale or out-of-order events return
//! [`Resolution::Stale`] and leave state untouched.
//!
//! ## Security and privacy notes
//! Only the preview data URL is retained for display. Logs reference
//! submissions by sequence number and payload fingerprint.

use sample_lens_core::{AnalysisFailure, AnalysisResult, ImagePayload};
use sample_lens_imaging::PreparedImage;
use sample_lens_narrator::ProgressNarrator;
use tracing::{debug, info, warn};

/// Mutually exclusive session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing selected or in flight.
    Idle,
    /// Request issued, not yet acknowledged as sent.
    Submitting,
    /// Request in flight; narrator running.
    Analyzing,
    /// Latest request produced a result.
    Succeeded(AnalysisResult),
    /// Latest request failed.
    Failed(AnalysisFailure),
}

impl SessionState {
    /// Returns `true` while a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitting | Self::Analyzing)
    }

    /// Short phase name for logs and status lines.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Analyzing => "analyzing",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Sequence tag identifying one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    /// Monotonic sequence number.
    pub fn sequence(self) -> u64 {
        self.0
    }
}

/// Work item produced by [`SessionController::submit`].
#[derive(Debug)]
pub struct SubmitTicket {
    /// Tag to pass back with the outcome.
    pub ticket: RequestTicket,
    /// Payload to send; owned by the worker from here on.
    pub payload: ImagePayload,
}

/// Whether an event changed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Event belonged to the current submission and was applied.
    Applied,
    /// Event belonged to a superseded submission and was ignored.
    Stale,
}

/// Holds the most recent successful result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultStore {
    latest: Option<AnalysisResult>,
}

impl ResultStore {
    /// Replaces the stored result wholesale.
    pub fn replace(&mut self, result: AnalysisResult) {
        self.latest = Some(result);
    }

    /// Drops the stored result.
    pub fn clear(&mut self) {
        self.latest = None;
    }

    /// Stored result, if any.
    pub fn latest(&self) -> Option<&AnalysisResult> {
        self.latest.as_ref()
    }
}

/// Analysis session state machine.
#[derive(Debug, Clone)]
pub struct SessionController {
    state: SessionState,
    selected_preview: Option<String>,
    results: ResultStore,
    narrator: ProgressNarrator,
    last_sequence: u64,
    active: Option<RequestTicket>,
}

impl SessionController {
    /// Creates an idle controller that narrates with `narrator`.
    pub fn new(narrator: ProgressNarrator) -> Self {
        Self {
            state: SessionState::Idle,
            selected_preview: None,
            results: ResultStore::default(),
            narrator,
            last_sequence: 0,
            active: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Preview of the selected image, if any.
    pub fn selected_preview(&self) -> Option<&str> {
        self.selected_preview.as_deref()
    }

    /// Latest successful result, if any.
    pub fn latest_result(&self) -> Option<&AnalysisResult> {
        self.results.latest()
    }

    /// Status line published by the narrator, if analyzing.
    pub fn status_line(&self) -> Option<&str> {
        self.narrator.current()
    }

    /// Time of the next narrator rotation, if analyzing.
    pub fn next_status_change_at_ms(&self) -> Option<u64> {
        self.narrator.next_fire_at_ms()
    }

    /// Ticket of the outstanding submission, if any.
    pub fn active_ticket(&self) -> Option<RequestTicket> {
        self.active
    }

    /// Starts a new session for `image`.
    ///
    /// Allowed from any state. An outstanding submission is superseded: its
    /// eventual outcome will be reported as [`Resolution::Stale`].
    pub fn submit(&mut self, image: PreparedImage) -> SubmitTicket {
        if let Some(previous) = self.active {
            warn!(
                stage = "session",
                action = "supersede",
                superseded = previous.sequence(),
                "new submission supersedes in-flight request"
            );
        }

        self.last_sequence += 1;
        let ticket = RequestTicket(self.last_sequence);
        self.active = Some(ticket);
        self.selected_preview = Some(image.preview_data_url);
        self.narrator.stop();
        self.state = SessionState::Submitting;

        info!(
            stage = "session",
            action = "submit",
            sequence = ticket.sequence(),
            fingerprint = %image.payload.fingerprint(),
            "submission started"
        );

        SubmitTicket {
            ticket,
            payload: image.payload,
        }
    }

    /// Records that the request for `ticket` left the client.
    ///
    /// Moves `Submitting -> Analyzing` and starts the narrator at `now_ms`.
    pub fn mark_request_sent(&mut self, ticket: RequestTicket, now_ms: u64) -> Resolution {
        if self.active != Some(ticket) || self.state != SessionState::Submitting {
            debug!(
                stage = "session",
                action = "request_sent_ignored",
                sequence = ticket.sequence(),
                "request-sent event is not current"
            );
            return Resolution::Stale;
        }

        self.state = SessionState::Analyzing;
        self.narrator.start(now_ms);
        info!(
            stage = "session",
            action = "analyzing",
            sequence = ticket.sequence(),
            "request sent"
        );
        Resolution::Applied
    }

    /// Applies the outcome of the request tagged `ticket`.
    ///
    /// Success stores the result; failure clears the selected image and any
    /// stored result. Either way the narrator stops. Outcomes for superseded
    /// or reset submissions are discarded.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<AnalysisResult, AnalysisFailure>,
    ) -> Resolution {
        if self.active != Some(ticket) {
            info!(
                stage = "session",
                action = "discard_stale",
                sequence = ticket.sequence(),
                current = self.last_sequence,
                "discarding stale response"
            );
            return Resolution::Stale;
        }

        self.active = None;
        self.narrator.stop();

        match outcome {
            Ok(result) => {
                info!(
                    stage = "session",
                    action = "succeeded",
                    sequence = ticket.sequence(),
                    health_score = result.health_score.value(),
                    "analysis succeeded"
                );
                self.results.replace(result.clone());
                self.state = SessionState::Succeeded(result);
            }
            Err(failure) => {
                warn!(
                    stage = "session",
                    action = "failed",
                    sequence = ticket.sequence(),
                    error = %failure,
                    "analysis failed"
                );
                // Invariant:
                // - A failed session leaves no selected image or stale result
                //   behind, so the next attempt starts clean.
                self.selected_preview = None;
                self.results.clear();
                self.state = SessionState::Failed(failure);
            }
        }

        Resolution::Applied
    }

    /// Returns to `Idle`, clearing image, result, and narrator.
    ///
    /// Any outstanding submission becomes stale.
    pub fn reset(&mut self) {
        self.active = None;
        self.selected_preview = None;
        self.results.clear();
        self.narrator.stop();
        self.state = SessionState::Idle;
        info!(stage = "session", action = "reset", "session reset");
    }

    /// Advances the narrator; returns `true` when the status line changed.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.state != SessionState::Analyzing {
            return false;
        }
        self.narrator.tick(now_ms)
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(ProgressNarrator::default())
    }
}
