//! Integration tests for keeping image bytes out of logs.

use sample_lens_app::redact_data_urls;

#[test]
fn log_redaction_tests_replaces_data_url_bodies() {
    let raw = "preview=data:image/jpeg;base64,/9j/4AAQSkZJRg== next";
    let redacted = redact_data_urls(raw);

    assert_eq!(redacted, "preview=data:image/jpeg;base64,<redacted 16 chars> next");
    assert!(!redacted.contains("/9j/"));
}

#[test]
fn log_redaction_tests_leaves_plain_text_alone() {
    assert_eq!(redact_data_urls("no payload here"), "no payload here");
    assert_eq!(redact_data_urls("data: without marker"), "data: without marker");
}
