//! Integration tests for history reloads, filtering, and failure retention.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedApi, history_entries};
use sample_lens_app::HistoryRuntime;
use sample_lens_core::{AnalysisFailure, parse_date};

const SETTLE: Duration = Duration::from_secs(5);

#[test]
fn history_runtime_tests_january_range_is_inclusive() {
    let api = Arc::new(ScriptedApi::with_history(history_entries(&[
        "2023-12-31T23:59:59",
        "2024-01-01T00:00:00",
        "2024-01-31T23:59:59.999",
        "2024-02-01T00:00:00",
    ])));
    let mut runtime = HistoryRuntime::new(api, 10).expect("runtime should build");

    runtime
        .set_date_range(
            Some(parse_date("2024-01-01").expect("date parses")),
            Some(parse_date("2024-01-31").expect("date parses")),
        )
        .expect("reload should start");
    assert!(runtime.settle(SETTLE));

    let ids: Vec<&str> = runtime
        .history()
        .entries()
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(ids, vec!["h1", "h2"]);
}

#[test]
fn history_runtime_tests_page_change_reloads_and_filter_resets_page() {
    let stamps: Vec<String> = (1..=23)
        .map(|day| format!("2024-03-{day:02}T12:00:00Z"))
        .collect();
    let stamps: Vec<&str> = stamps.iter().map(String::as_str).collect();
    let api = Arc::new(ScriptedApi::with_history(history_entries(&stamps)));
    let mut runtime = HistoryRuntime::new(api, 10).expect("runtime should build");

    runtime.reload().expect("reload should start");
    assert!(runtime.settle(SETTLE));
    runtime.set_page(2).expect("reload should start");
    assert!(runtime.settle(SETTLE));

    let view = runtime.view();
    assert_eq!(view.rows.len(), 3);
    assert_eq!(
        view.pagination.as_ref().map(|p| p.label.as_str()),
        Some("Page 3 of 3")
    );

    runtime
        .set_date_range(Some(parse_date("2024-03-10").expect("date parses")), None)
        .expect("reload should start");
    assert_eq!(runtime.history().page(), 0);
    assert!(runtime.settle(SETTLE));
    assert_eq!(runtime.history().entries().len(), 14);
}

#[test]
fn history_runtime_tests_failed_reload_keeps_previous_entries() {
    let api = Arc::new(ScriptedApi::with_history(history_entries(&[
        "2024-05-01T08:00:00Z",
        "2024-05-02T08:00:00Z",
    ])));
    let mut runtime = HistoryRuntime::new(api.clone(), 10).expect("runtime should build");
    runtime.reload().expect("reload should start");
    assert!(runtime.settle(SETTLE));

    api.take_history_down();
    runtime.clear_filters().expect("reload should start");
    assert!(runtime.settle(SETTLE));

    assert_eq!(runtime.history().entries().len(), 2);
    assert!(matches!(
        runtime.history().error(),
        Some(AnalysisFailure::Transport(_))
    ));
    assert!(runtime.view().error_banner.is_some());
    assert_eq!(runtime.view().rows.len(), 2);
}

#[test]
fn history_runtime_tests_next_page_is_noop_on_last_page() {
    let api = Arc::new(ScriptedApi::with_history(history_entries(&[
        "2024-05-01T08:00:00Z",
    ])));
    let mut runtime = HistoryRuntime::new(api, 10).expect("runtime should build");
    runtime.reload().expect("reload should start");
    assert!(runtime.settle(SETTLE));

    assert_eq!(runtime.next_page().expect("no worker needed"), None);
    assert_eq!(runtime.previous_page().expect("no worker needed"), None);
    assert!(runtime.view().pagination.is_none());
}
