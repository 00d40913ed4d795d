/// Structured logging for the climate ingestion service
///
/// Installs a `tracing` subscriber with a level filter, optional timestamps
/// and an optional append-only log file, and classifies per-request failures
/// so that bad input and backend faults land at different severities.

use crate::error::{ConfigError, IngestError};
use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Invalid {
                key: "LOG_LEVEL",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// Minimum level; `RUST_LOG` overrides it when set
    pub min_level: LogLevel,
    /// Append log lines to this file instead of stderr
    pub log_file: Option<String>,
    /// Prefix each line with a timestamp
    pub timestamps: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            log_file: None,
            timestamps: true,
        }
    }
}

/// Install the global subscriber. Fails if the log file cannot be opened or a
/// subscriber is already installed.
pub fn init_logger(settings: &LogSettings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.min_level.directive()));

    let writer = match &settings.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(settings.log_file.is_none());

    if settings.timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The request was bad; redelivering it unchanged will fail again
    Rejected,
    /// The storage backend or its credentials failed
    Backend,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Rejected => write!(f, "REJECTED"),
            FailureType::Backend => write!(f, "BACKEND"),
        }
    }
}

pub fn classify_ingest_failure(err: &IngestError) -> FailureType {
    if err.is_rejected_input() {
        FailureType::Rejected
    } else {
        FailureType::Backend
    }
}

/// Log a failed push at a severity matching its classification.
pub fn log_ingest_failure(err: &IngestError) -> FailureType {
    let failure_type = classify_ingest_failure(err);

    match failure_type {
        FailureType::Rejected => {
            warn!(failure = %failure_type, error = %err, "push rejected")
        }
        FailureType::Backend => {
            error!(failure = %failure_type, error = %err, "error occurred while adding a new row")
        }
    }
    failure_type
}
