#![warn(missing_docs)]
//! # sample-lens-history
//!
//! ## Purpose
//! Holds the cached history list and derives the filtered, paginated view.
//!
//! ## Responsibilities
//! - Issue one tagged load per filter or page request and drop stale replies.
//! - Replace the cached list on success; keep it and raise an error flag on
//!   failure.
//! - Merge filter patches and reset pagination to the first page.
//! - Derive page slices with totals that never divide by zero.
//!
//! ## Data flow
//! Filter change -> [`HistoryController::begin_load`] -> [`HistoryTicket`]
//! handed to a fetch worker -> [`HistoryController::complete_load`] ->
//! [`HistoryController::view`] consumed by the presentation layer.
//!
//! ## Ownership and lifetimes
//! The controller owns its entries. [`HistoryPage`] borrows a slice of them
//! and must be dropped before the next mutation.
//!
//! ## Error model
//! Construction fails with [`HistoryError`] for a zero page size. Fetch
//! failures are recorded on the controller, never returned.
//!
//! ## Security and privacy notes
//! Entries stay in memory for the lifetime of the controller; logs carry
//! counts and sequence numbers only.

use sample_lens_core::{AnalysisFailure, FilterPatch, HistoryEntry, HistoryFilter};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Entries shown per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Number of pages needed for `count` entries; `0` when there are none.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// Tag and filter snapshot for one history load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryTicket {
    sequence: u64,
    filter: HistoryFilter,
}

impl HistoryTicket {
    /// Monotonic sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Filter captured when the load began.
    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }
}

/// Whether a load outcome changed the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResolution {
    /// Outcome belonged to the latest load.
    Applied,
    /// Outcome belonged to a superseded load and was dropped.
    Stale,
}

/// Derived page of the cached history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage<'a> {
    /// Entries on this page.
    pub entries: &'a [HistoryEntry],
    /// Zero-based page index after clamping.
    pub page: usize,
    /// Page count; `0` when nothing is cached.
    pub total_pages: usize,
    /// Cached entry count.
    pub total_entries: usize,
    /// A previous page exists.
    pub has_previous: bool,
    /// A next page exists.
    pub has_next: bool,
}

impl HistoryPage<'_> {
    /// Returns `true` when the view should render its empty state.
    pub fn is_empty(&self) -> bool {
        self.total_entries == 0
    }
}

/// History list, filter, and pagination state.
#[derive(Debug, Clone)]
pub struct HistoryController {
    entries: Vec<HistoryEntry>,
    filter: HistoryFilter,
    page: usize,
    page_size: usize,
    error: Option<AnalysisFailure>,
    last_sequence: u64,
    pending: Option<u64>,
}

impl HistoryController {
    /// Creates an empty controller.
    ///
    /// # Errors
    /// Returns [`HistoryError::ZeroPageSize`] when `page_size == 0`.
    pub fn new(page_size: usize) -> Result<Self, HistoryError> {
        if page_size == 0 {
            return Err(HistoryError::ZeroPageSize);
        }
        Ok(Self {
            entries: Vec::new(),
            filter: HistoryFilter::unbounded(),
            page: 0,
            page_size,
            error: None,
            last_sequence: 0,
            pending: None,
        })
    }

    /// Starts a load with the current filter.
    ///
    /// Any load already outstanding becomes stale.
    pub fn begin_load(&mut self) -> HistoryTicket {
        self.last_sequence += 1;
        self.pending = Some(self.last_sequence);
        debug!(
            stage = "history",
            action = "load",
            sequence = self.last_sequence,
            bounded = !self.filter.is_unbounded(),
            "history load started"
        );
        HistoryTicket {
            sequence: self.last_sequence,
            filter: self.filter,
        }
    }

    /// Applies the outcome of the load tagged `ticket`.
    ///
    /// Success replaces the cached list, clears the error flag, and clamps the
    /// page. Failure keeps the cached list and records the error.
    pub fn complete_load(
        &mut self,
        ticket: &HistoryTicket,
        outcome: Result<Vec<HistoryEntry>, AnalysisFailure>,
    ) -> LoadResolution {
        if self.pending != Some(ticket.sequence) {
            info!(
                stage = "history",
                action = "discard_stale",
                sequence = ticket.sequence,
                current = self.last_sequence,
                "discarding stale history response"
            );
            return LoadResolution::Stale;
        }
        self.pending = None;

        match outcome {
            Ok(entries) => {
                info!(
                    stage = "history",
                    action = "loaded",
                    sequence = ticket.sequence,
                    count = entries.len(),
                    "history loaded"
                );
                self.entries = entries;
                self.error = None;
                self.clamp_page();
            }
            Err(failure) => {
                warn!(
                    stage = "history",
                    action = "load_failed",
                    sequence = ticket.sequence,
                    retained = self.entries.len(),
                    error = %failure,
                    "history load failed; keeping cached entries"
                );
                self.error = Some(failure);
            }
        }

        LoadResolution::Applied
    }

    /// Merges `patch` into the filter and returns to the first page.
    pub fn set_filter(&mut self, patch: FilterPatch) {
        self.filter = self.filter.merged(&patch);
        self.page = 0;
    }

    /// Removes both bounds and returns to the first page.
    pub fn clear_filters(&mut self) {
        self.set_filter(FilterPatch::clear());
    }

    /// Sets the page index as given; the view clamps it.
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    /// Moves one page forward if one exists; returns `true` on change.
    pub fn next_page(&mut self) -> bool {
        let view = self.view();
        if !view.has_next {
            return false;
        }
        self.page = view.page + 1;
        true
    }

    /// Moves one page back if one exists; returns `true` on change.
    pub fn previous_page(&mut self) -> bool {
        let view = self.view();
        if !view.has_previous {
            return false;
        }
        self.page = view.page - 1;
        true
    }

    /// Derives the current page.
    pub fn view(&self) -> HistoryPage<'_> {
        let total_entries = self.entries.len();
        let total_pages = total_pages(total_entries, self.page_size);
        let page = self.page.min(total_pages.saturating_sub(1));
        let start = (page * self.page_size).min(total_entries);
        let end = (start + self.page_size).min(total_entries);

        HistoryPage {
            entries: &self.entries[start..end],
            page,
            total_pages,
            total_entries,
            has_previous: page > 0,
            has_next: page + 1 < total_pages,
        }
    }

    /// Looks up a cached entry for the detail view.
    pub fn find_entry(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Every cached entry.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Current filter.
    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }

    /// Requested page index before clamping.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Entries per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns `true` while a load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Error from the latest load, if it failed.
    pub fn error(&self) -> Option<&AnalysisFailure> {
        self.error.as_ref()
    }

    fn clamp_page(&mut self) {
        let last = total_pages(self.entries.len(), self.page_size).saturating_sub(1);
        self.page = self.page.min(last);
    }
}

impl Default for HistoryController {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            filter: HistoryFilter::unbounded(),
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            error: None,
            last_sequence: 0,
            pending: None,
        }
    }
}

/// History configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// Pages must hold at least one entry.
    #[error("page size must be greater than zero")]
    ZeroPageSize,
}
