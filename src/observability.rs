//! Logging setup for batch runs, plus the span that tags every event of a
//! device-day run with its device, day, station model and config.

use std::env;
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, info_span, Span};
use tracing_subscriber::EnvFilter;

use crate::station::StationModel;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    /// One line per event; the default for batch runs.
    Compact,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `qod=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Reads `QOD_LOG_LEVEL` and `QOD_LOG_FORMAT`.
pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from(|key| env::var(key).ok())
}

/// Builds a config from any key lookup; blank or unknown values keep the
/// defaults.
pub fn logging_config_from<F>(lookup: F) -> LoggingConfig
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = LoggingConfig::default();
    let filter = lookup("QOD_LOG_LEVEL")
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or(defaults.filter);
    let format = lookup("QOD_LOG_FORMAT")
        .and_then(|raw| LogFormat::parse(&raw))
        .unwrap_or(defaults.format);

    LoggingConfig { filter, format }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            builder
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        )?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.compact().with_ansi(false).finish())?
        }
    }

    Ok(())
}

/// Span entered for one device-day; events emitted inside carry its fields.
pub fn device_day_span(
    day: NaiveDate,
    model: StationModel,
    device_id: Option<&str>,
    config_fingerprint: &str,
) -> Span {
    info_span!(
        "device_day",
        device_id = device_id.unwrap_or(""),
        day = %day,
        model = model.as_str(),
        config_fingerprint = %config_fingerprint
    )
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "qod_run",
        event = "app.start",
        log_filter = %config.filter,
        log_format = ?config.format
    );
}

/// Records where a batch run reads from and writes to.
pub fn log_run_inputs(
    input: &Path,
    day: NaiveDate,
    device_id: Option<&str>,
    output: Option<&Path>,
    store: Option<&Path>,
) {
    info!(
        component = "qod_run",
        event = "app.inputs",
        input = %input.display(),
        day = %day,
        device_id = device_id.unwrap_or(""),
        output = %output.map(|p| p.display().to_string()).unwrap_or_default(),
        store = %store.map(|p| p.display().to_string()).unwrap_or_default()
    );
}
