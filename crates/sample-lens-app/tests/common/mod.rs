//! Shared fixtures for app integration tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};
use sample_lens_app::{AnalysisRuntime, MonotonicClock};
use sample_lens_client::{AnalysisApi, ApiError, ServiceHealth, SyntheticAnalysisService};
use sample_lens_core::{
    AnalysisResult, HealthScore, HistoryEntry, HistoryFilter, ImagePayload, parse_timestamp,
};
use sample_lens_imaging::{CropRegion, PreparedImage};

/// Scripted reply for one payload.
#[allow(dead_code)]
pub struct Reply {
    /// Time the fake service takes to answer.
    pub delay: Duration,
    /// Score to return, or `None` for a transport failure.
    pub score: Option<u8>,
}

/// Fake service keyed by payload body with controllable latency.
#[allow(dead_code)]
pub struct ScriptedApi {
    replies: HashMap<String, Reply>,
    history: Vec<HistoryEntry>,
    history_down: AtomicBool,
}

#[allow(dead_code)]
impl ScriptedApi {
    /// Creates a service answering `replies` by payload body.
    pub fn new(replies: Vec<(&str, Reply)>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|(body, reply)| (body.to_string(), reply))
                .collect(),
            history: Vec::new(),
            history_down: AtomicBool::new(false),
        }
    }

    /// Creates a service with a fixed history store.
    pub fn with_history(history: Vec<HistoryEntry>) -> Self {
        Self {
            replies: HashMap::new(),
            history,
            history_down: AtomicBool::new(false),
        }
    }

    /// Makes subsequent history fetches fail.
    pub fn take_history_down(&self) {
        self.history_down.store(true, Ordering::SeqCst);
    }
}

impl AnalysisApi for ScriptedApi {
    fn analyze_image(&self, payload: &ImagePayload) -> Result<AnalysisResult, ApiError> {
        let reply = self
            .replies
            .get(payload.as_base64())
            .ok_or_else(|| ApiError::Transport("unscripted payload".to_string()))?;
        thread::sleep(reply.delay);
        match reply.score {
            Some(score) => Ok(SyntheticAnalysisService::canned_result(
                HealthScore::new(score).expect("scripted score should be valid"),
            )),
            None => Err(ApiError::Transport("connection reset".to_string())),
        }
    }

    fn fetch_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, ApiError> {
        if self.history_down.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("history store unreachable".to_string()));
        }
        Ok(self
            .history
            .iter()
            .filter(|entry| filter.contains(entry.recorded_at))
            .cloned()
            .collect())
    }

    fn check_health(&self) -> ServiceHealth {
        ServiceHealth::Up
    }
}

/// Prepared image whose payload body is `body`.
#[allow(dead_code)]
pub fn prepared(body: &str) -> PreparedImage {
    PreparedImage {
        payload: ImagePayload::new(body, 512, 512).expect("payload fixture should be valid"),
        preview_data_url: format!("data:image/jpeg;base64,{body}"),
        source_width: 512,
        source_height: 512,
        crop: CropRegion {
            x: 0,
            y: 0,
            size: 512,
        },
    }
}

/// PNG bytes of a blank `width x height` image.
#[allow(dead_code)]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("png fixture should encode");
    buffer.into_inner()
}

/// History entries, one per timestamp, with ids `h0`, `h1`, ...
#[allow(dead_code)]
pub fn history_entries(timestamps: &[&str]) -> Vec<HistoryEntry> {
    timestamps
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            HistoryEntry::new(
                format!("h{index}"),
                parse_timestamp(raw).expect("timestamp fixture should parse"),
                SyntheticAnalysisService::canned_result(
                    HealthScore::new(5).expect("valid score"),
                ),
            )
            .expect("entry fixture should be valid")
        })
        .collect()
}

/// Pumps `runtime` until `done` holds or five seconds pass.
#[allow(dead_code)]
pub fn drive_until<F>(runtime: &mut AnalysisRuntime, clock: &MonotonicClock, done: F)
where
    F: Fn(&AnalysisRuntime) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(runtime) {
        assert!(Instant::now() < deadline, "runtime did not settle in time");
        runtime.pump_blocking(Duration::from_millis(20), clock);
    }
}
