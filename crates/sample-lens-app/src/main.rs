#![warn(missing_docs)]
//! # sample-lens binary
//!
//! Command-line shell that drives the analysis and history runtimes and
//! renders their UI projections as text.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use sample_lens_app::{
    AnalysisRuntime, AppConfig, AppError, HistoryRuntime, MonotonicClock, app_version, build_api,
    redact_data_urls,
};
use sample_lens_client::ServiceHealth;
use sample_lens_core::parse_date;
use sample_lens_imaging::{ImageSource, RawImageFile};
use sample_lens_ui::{HistoryView, UiState};
use tracing::{error, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "sample-lens")]
#[command(about = "Analyze sample photos and browse past results", long_about = None)]
#[command(version = sample_lens_app::APP_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize an image and submit it for analysis.
    Analyze {
        /// Image file to analyze.
        path: PathBuf,
        /// How the file was handed over.
        #[arg(long, value_enum, default_value_t = SourceArg::Picker)]
        source: SourceArg,
    },
    /// List past analyses.
    History {
        /// First day to include (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,
        /// Last day to include (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
        /// Zero-based page index.
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    /// Check whether the analysis service is reachable.
    Health,
    /// Print the application version.
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Picker,
    Drop,
}

impl From<SourceArg> for ImageSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Picker => ImageSource::FilePicker,
            SourceArg::Drop => ImageSource::DragAndDrop,
        }
    }
}

/// CLI entry point.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(error) => {
            error!(stage = "app", action = "exit", error = %error, "command failed");
            eprintln!("sample-lens: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, AppError> {
    if let Command::Version = command {
        println!("sample-lens {}", app_version());
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::from_env();
    info!(
        stage = "app",
        action = "start",
        version = app_version(),
        endpoint = %config.api_base_url,
        "sample-lens starting"
    );
    let api = build_api(&config)?;

    match command {
        Command::Analyze { path, source } => {
            let mut runtime = AnalysisRuntime::new(api, config.narrator()?);
            analyze(&mut runtime, &path, source.into())
        }
        Command::History { start, end, page } => {
            let mut runtime = HistoryRuntime::new(api, config.history_page_size)?;
            let start = start.as_deref().map(parse_date).transpose()?;
            let end = end.as_deref().map(parse_date).transpose()?;
            runtime.set_date_range(start, end)?;
            settle_or_warn(&mut runtime, config.request_timeout);
            if page > 0 {
                runtime.set_page(page)?;
                settle_or_warn(&mut runtime, config.request_timeout);
            }
            render_history(&runtime.view());
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => match api.check_health() {
            ServiceHealth::Up => {
                println!("service: up");
                Ok(ExitCode::SUCCESS)
            }
            ServiceHealth::Down => {
                println!("service: down");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Version => Ok(ExitCode::SUCCESS),
    }
}

fn analyze(
    runtime: &mut AnalysisRuntime,
    path: &Path,
    source: ImageSource,
) -> Result<ExitCode, AppError> {
    let bytes = std::fs::read(path).map_err(|source| AppError::Input {
        path: path.display().to_string(),
        source,
    })?;
    let declared_media_type = media_type_for(path);
    let clock = MonotonicClock::start();

    let submitted = runtime.select_file(
        RawImageFile {
            source,
            declared_media_type,
            bytes: &bytes,
        },
        clock.now_ms(),
    )?;
    if submitted.is_none() {
        render_toasts(runtime.ui());
        return Ok(ExitCode::FAILURE);
    }

    if let Some(preview) = runtime.ui().preview.as_deref() {
        println!("preview: {}", redact_data_urls(preview));
    }

    let mut last_status: Option<String> = None;
    while runtime.session().state().is_in_flight() {
        runtime.pump_blocking(POLL_INTERVAL, &clock);
        let status = runtime.ui().status_line.clone();
        if status.is_some() && status != last_status {
            if let Some(line) = status.as_deref() {
                println!("{line}");
            }
        }
        last_status = status;
    }

    let ui = runtime.ui();
    match ui.result.as_ref() {
        Some(result) => {
            for (label, value) in &result.metrics {
                println!("{label}: {value}");
            }
            println!("Health score: {} ({})", result.score_text, result.band.label());
            print_list("Potential concerns", &result.concerns);
            print_list("Recommendations", &result.recommendations);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            render_toasts(ui);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn settle_or_warn(runtime: &mut HistoryRuntime, timeout: Duration) {
    if !runtime.settle(timeout) {
        eprintln!("history request did not finish within {}s", timeout.as_secs());
    }
}

fn media_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => return None,
    })
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{title}:");
    for item in items {
        println!("  - {item}");
    }
}

fn render_toasts(ui: &UiState) {
    for toast in &ui.toasts {
        eprintln!("error: {}", toast.message);
    }
}

fn render_history(view: &HistoryView) {
    if let Some(banner) = view.error_banner.as_deref() {
        eprintln!("{banner}");
    }
    if view.empty {
        println!("No analysis history found.");
        return;
    }
    for row in &view.rows {
        println!(
            "{}  {}  {}  {}  [{}]",
            row.date_text, row.score_text, row.band_label, row.shape, row.id
        );
    }
    if let Some(pagination) = view.pagination.as_ref() {
        println!("{}", pagination.label);
    }
}
