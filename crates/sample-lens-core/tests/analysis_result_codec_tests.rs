//! Tests the serialized shape of analysis results and history entries.

use sample_lens_core::{AnalysisResult, HealthScore, HistoryEntry, parse_timestamp};

fn fixture_result() -> AnalysisResult {
    AnalysisResult {
        color: "Medium brown".to_string(),
        consistency: "Soft".to_string(),
        shape: "Type 4".to_string(),
        health_score: HealthScore::new(8).expect("score in range"),
        concerns: vec![],
        recommendations: vec!["Stay hydrated".to_string()],
    }
}

#[test]
fn analysis_result_codec_tests_uses_service_field_names() {
    let value = serde_json::to_value(fixture_result()).expect("result should serialize");
    assert_eq!(value["health_score"], 8);
    assert_eq!(value["recommendations"][0], "Stay hydrated");
}

#[test]
fn analysis_result_codec_tests_history_entry_keeps_rfc3339_time() {
    let entry = HistoryEntry::new(
        "entry-1",
        parse_timestamp("2024-01-10T09:00:00Z").expect("timestamp parses"),
        fixture_result(),
    )
    .expect("entry should build");

    let encoded = serde_json::to_string(&entry).expect("entry should serialize");
    assert!(encoded.contains("2024-01-10T09:00:00Z"));
    assert!(HistoryEntry::new(" ", entry.recorded_at, fixture_result()).is_err());
}
