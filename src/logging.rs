use anyhow::{Context, Result, bail};
use tracing::Span;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "oasis-pipeline";
const LOG_FILE_SUFFIX: &str = "log";

/// Replaces `logging.filter` for the JSON file layer when set.
pub const LOG_FILTER_ENV: &str = "OASIS_PIPELINE_LOG";

/// Owns the run's identity and the file writer's flush guard.
///
/// Every event recorded inside [`LoggingGuard::run_span`] carries the run id,
/// so one run's lines can be picked out of a shared log directory.
pub struct LoggingGuard {
    _writer: WorkerGuard,
    run_id: Uuid,
    run_span: Span,
}

impl LoggingGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_span(&self) -> &Span {
        &self.run_span
    }
}

pub fn init_tracing(config: &LoggingConfig) -> Result<LoggingGuard> {
    if config.dir.as_os_str().is_empty() {
        bail!("logging.dir cannot be empty");
    }
    let (directives, filter_source) = file_filter(config, std::env::var(LOG_FILTER_ENV).ok());
    let filter = parse_filter(&directives, filter_source)?;

    let appender = pipeline_log_appender(config)?;
    let (writer, writer_guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter);
    let stderr_layer = config.stderr_warn_enabled.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7();
    let run_span = tracing::info_span!(target: "runner", "pipeline_run", run_id = %run_id);
    run_span.in_scope(|| {
        tracing::info!(
            target: "logging",
            dir = %config.dir.display(),
            filter = %directives,
            filter_source = filter_source,
            rotation = ?config.rotation,
            retained_files = retained_files(&config.rotation, config.retention_days),
            "logging_initialized"
        );
    });

    Ok(LoggingGuard {
        _writer: writer_guard,
        run_id,
        run_span,
    })
}

/// File-layer directives and where they came from.
fn file_filter(config: &LoggingConfig, from_env: Option<String>) -> (String, &'static str) {
    match from_env {
        Some(directives) if !directives.trim().is_empty() => (directives, LOG_FILTER_ENV),
        _ => (config.filter.clone(), "logging.filter"),
    }
}

fn parse_filter(directives: &str, source: &str) -> Result<EnvFilter> {
    if directives.trim().is_empty() {
        bail!("{source} cannot be empty");
    }
    EnvFilter::builder()
        .parse(directives)
        .with_context(|| format!("failed to parse {source} '{directives}'"))
}

/// Rotated files kept on disk; the appender prunes older ones as it rolls.
fn retained_files(rotation: &LoggingRotation, retention_days: usize) -> usize {
    match rotation {
        LoggingRotation::Daily => retention_days,
        LoggingRotation::Hourly => retention_days.saturating_mul(24),
    }
    .max(1)
}

fn pipeline_log_appender(config: &LoggingConfig) -> Result<RollingFileAppender> {
    let rotation = match config.rotation {
        LoggingRotation::Daily => Rotation::DAILY,
        LoggingRotation::Hourly => Rotation::HOURLY,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(retained_files(&config.rotation, config.retention_days))
        .build(&config.dir)
        .with_context(|| format!("failed to open log directory {}", config.dir.display()))
}
