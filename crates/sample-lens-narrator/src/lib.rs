#![warn(missing_docs)]
//! # sample-lens-narrator
//!
//! ## Purpose
//! Publishes a rotating, human-readable status line while an analysis is in
//! flight.
//!
//! ## Responsibilities
//! - Validate the status sequence and step duration.
//! - Model the rotation timer as an explicit [`ScheduledTask`].
//! - Publish index 0 on start, advance circularly on each elapsed step, and
//!   clear the published value on stop.
//!
//! ## Data flow
//! Session controller enters `Analyzing` -> [`ProgressNarrator::start`];
//! the owning event loop calls [`ProgressNarrator::tick`] with the current
//! time; any exit transition calls [`ProgressNarrator::stop`].
//!
//! ## Ownership and lifetimes
//! The narrator owns its status strings and timer state. Time is passed in as
//! milliseconds so tests drive it with simulated ticks instead of sleeping.
//!
//! ## Error model
//! An empty sequence or a zero step duration is rejected by
//! [`NarratorConfig::new`] with [`NarratorError`].
//!
//! ## Security and privacy notes
//! Status strings are static copy; no sample data flows through this crate.

use thiserror::Error;
use tracing::trace;

/// Time each status line stays visible.
pub const DEFAULT_STEP_DURATION_MS: u64 = 2_000;

/// Status lines shown while the service analyzes a sample.
pub const DEFAULT_ANALYSIS_STEPS: [&str; 8] = [
    "Analyzing sample characteristics...",
    "Evaluating color patterns and consistency...",
    "Measuring physical dimensions...",
    "Calculating Bristol scale rating...",
    "Assessing hydration indicators...",
    "Detecting potential irregularities...",
    "Computing comprehensive health score...",
    "Generating personalized recommendations...",
];

/// Validated narrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarratorConfig {
    steps: Vec<String>,
    step_duration_ms: u64,
}

impl NarratorConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    /// Returns [`NarratorError::EmptySequence`] when `steps` is empty and
    /// [`NarratorError::ZeroStepDuration`] when `step_duration_ms == 0`.
    pub fn new(steps: Vec<String>, step_duration_ms: u64) -> Result<Self, NarratorError> {
        if steps.is_empty() {
            return Err(NarratorError::EmptySequence);
        }
        if step_duration_ms == 0 {
            return Err(NarratorError::ZeroStepDuration);
        }
        Ok(Self {
            steps,
            step_duration_ms,
        })
    }

    /// Default status lines with a custom step duration.
    ///
    /// # Errors
    /// Returns [`NarratorError::ZeroStepDuration`] when `step_duration_ms == 0`.
    pub fn with_step_duration(step_duration_ms: u64) -> Result<Self, NarratorError> {
        Self::new(default_steps(), step_duration_ms)
    }

    /// Ordered status lines.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Duration of one step in milliseconds.
    pub fn step_duration_ms(&self) -> u64 {
        self.step_duration_ms
    }
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_duration_ms: DEFAULT_STEP_DURATION_MS,
        }
    }
}

fn default_steps() -> Vec<String> {
    DEFAULT_ANALYSIS_STEPS
        .iter()
        .map(|step| step.to_string())
        .collect()
}

/// Fixed-interval task driven by externally supplied time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    interval_ms: u64,
    next_fire_at_ms: u64,
}

impl ScheduledTask {
    /// Schedules the first firing one interval after `now_ms`.
    pub fn start(now_ms: u64, interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_fire_at_ms: now_ms.saturating_add(interval_ms),
        }
    }

    /// Time of the next firing.
    pub fn next_fire_at_ms(&self) -> u64 {
        self.next_fire_at_ms
    }

    /// Consumes every firing due at `now_ms` and returns how many there were.
    ///
    /// A late tick collapses the missed firings into one call so the caller
    /// can advance by the right number of steps.
    pub fn take_due(&mut self, now_ms: u64) -> u64 {
        if now_ms < self.next_fire_at_ms {
            return 0;
        }

        let fired = (now_ms - self.next_fire_at_ms) / self.interval_ms + 1;
        self.next_fire_at_ms = self
            .next_fire_at_ms
            .saturating_add(fired.saturating_mul(self.interval_ms));
        fired
    }
}

/// Rotating status publisher.
#[derive(Debug, Clone)]
pub struct ProgressNarrator {
    config: NarratorConfig,
    task: Option<ScheduledTask>,
    index: usize,
}

impl ProgressNarrator {
    /// Creates a stopped narrator.
    pub fn new(config: NarratorConfig) -> Self {
        Self {
            config,
            task: None,
            index: 0,
        }
    }

    /// Starts (or restarts) the rotation at index 0 and publishes it.
    pub fn start(&mut self, now_ms: u64) -> &str {
        self.index = 0;
        self.task = Some(ScheduledTask::start(now_ms, self.config.step_duration_ms));
        trace!(stage = "narrator", action = "start", now_ms, "narration started");
        &self.config.steps[0]
    }

    /// Advances the rotation for all steps elapsed by `now_ms`.
    ///
    /// Returns `true` when the published line changed. A stopped narrator
    /// never changes, so late ticks after [`Self::stop`] are inert.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let Some(task) = self.task.as_mut() else {
            return false;
        };

        let fired = task.take_due(now_ms);
        if fired == 0 {
            return false;
        }

        let len = self.config.steps.len() as u64;
        let previous = self.index;
        self.index = ((self.index as u64 + fired) % len) as usize;
        trace!(
            stage = "narrator",
            action = "advance",
            index = self.index,
            "narration advanced"
        );
        previous != self.index
    }

    /// Cancels the scheduled task and clears the published line.
    pub fn stop(&mut self) {
        if self.task.take().is_some() {
            trace!(stage = "narrator", action = "stop", "narration stopped");
        }
        self.index = 0;
    }

    /// Currently published line, `None` while stopped.
    pub fn current(&self) -> Option<&str> {
        self.task.map(|_| self.config.steps[self.index].as_str())
    }

    /// Index of the published line, `None` while stopped.
    pub fn current_index(&self) -> Option<usize> {
        self.task.map(|_| self.index)
    }

    /// Returns `true` while a task is scheduled.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Time of the next rotation, `None` while stopped.
    pub fn next_fire_at_ms(&self) -> Option<u64> {
        self.task.map(|task| task.next_fire_at_ms())
    }

    /// Active configuration.
    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }
}

impl Default for ProgressNarrator {
    fn default() -> Self {
        Self::new(NarratorConfig::default())
    }
}

/// Narrator configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NarratorError {
    /// At least one status line is required.
    #[error("status sequence must not be empty")]
    EmptySequence,
    /// Steps must have a positive duration.
    #[error("step duration must be greater than zero")]
    ZeroStepDuration,
}

#[cfg(test)]
mod tests {
    //! Unit tests for rotation timing with simulated ticks.

    use super::*;

    fn three_steps() -> ProgressNarrator {
        ProgressNarrator::new(
            NarratorConfig::new(vec!["a".into(), "b".into(), "c".into()], 100)
                .expect("config should be valid"),
        )
    }

    #[test]
    fn start_publishes_first_line_immediately() {
        let mut narrator = ProgressNarrator::default();
        assert_eq!(narrator.current(), None);
        assert_eq!(narrator.start(5_000), DEFAULT_ANALYSIS_STEPS[0]);
        assert_eq!(narrator.current(), Some(DEFAULT_ANALYSIS_STEPS[0]));
        assert_eq!(narrator.next_fire_at_ms(), Some(7_000));
    }

    #[test]
    fn rotation_wraps_from_last_to_first() {
        let mut narrator = three_steps();
        narrator.start(0);

        assert!(!narrator.tick(99));
        assert!(narrator.tick(100));
        assert_eq!(narrator.current(), Some("b"));
        assert!(narrator.tick(200));
        assert_eq!(narrator.current(), Some("c"));
        assert!(narrator.tick(300));
        assert_eq!(narrator.current(), Some("a"));
    }

    #[test]
    fn late_tick_advances_by_all_missed_steps() {
        let mut narrator = three_steps();
        narrator.start(0);
        narrator.tick(250);
        assert_eq!(narrator.current_index(), Some(2));
        assert_eq!(narrator.next_fire_at_ms(), Some(300));
    }

    #[test]
    fn stop_clears_and_later_ticks_are_inert() {
        let mut narrator = three_steps();
        narrator.start(0);
        narrator.tick(100);
        narrator.stop();

        assert_eq!(narrator.current(), None);
        assert!(!narrator.tick(10_000));
        assert_eq!(narrator.current(), None);
        assert!(!narrator.is_running());
    }

    #[test]
    fn restart_begins_again_at_first_line() {
        let mut narrator = three_steps();
        narrator.start(0);
        narrator.tick(150);
        assert_eq!(narrator.start(1_000), "a");
        assert!(!narrator.tick(1_050));
        assert_eq!(narrator.current(), Some("a"));
    }

    #[test]
    fn config_rejects_empty_sequence_and_zero_duration() {
        assert_eq!(
            NarratorConfig::new(Vec::new(), 10),
            Err(NarratorError::EmptySequence)
        );
        assert_eq!(
            NarratorConfig::with_step_duration(0),
            Err(NarratorError::ZeroStepDuration)
        );
    }
}
