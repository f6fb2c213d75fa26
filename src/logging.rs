/// Structured logging for the supply interruption service
///
/// Provides context-rich logging with pipeline stage and property
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for batch runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::SupplyError;

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

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Ingest,
    Classifier,
    Detector,
    Merger,
    Filter,
    Impact,
    Aggregator,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => write!(f, "CFG"),
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Classifier => write!(f, "CLASSIFY"),
            Stage::Detector => write!(f, "DETECT"),
            Stage::Merger => write!(f, "MERGE"),
            Stage::Filter => write!(f, "FILTER"),
            Stage::Impact => write!(f, "IMPACT"),
            Stage::Aggregator => write!(f, "AGG"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Bad upstream snapshot for one property; other properties are unaffected
    Expected,
    /// Configuration problem affecting the whole run
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, stage: Stage, property_id: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let property_part = property_id.map(|p| format!(" [{}]", p)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, stage, property_part, message)
    }

    fn log(&self, level: LogLevel, stage: Stage, property_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, stage, property_id, message);
        let property_part = property_id.map(|p| format!(" [{}]", p)).unwrap_or_default();

        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, property_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, property_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {}
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger. Until this is called, logging is a no-op.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn log_at(level: LogLevel, stage: Stage, property_id: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, property_id, message);
        }
    }
}

pub fn info(stage: Stage, property_id: Option<&str>, message: &str) {
    log_at(LogLevel::Info, stage, property_id, message);
}

pub fn warn(stage: Stage, property_id: Option<&str>, message: &str) {
    log_at(LogLevel::Warning, stage, property_id, message);
}

pub fn error(stage: Stage, property_id: Option<&str>, message: &str) {
    log_at(LogLevel::Error, stage, property_id, message);
}

pub fn debug(stage: Stage, property_id: Option<&str>, message: &str) {
    log_at(LogLevel::Debug, stage, property_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a pipeline failure by how far its effects reach
pub fn classify_failure(err: &SupplyError) -> FailureType {
    match err {
        SupplyError::InvalidConfiguration(_) => FailureType::Unexpected,
        SupplyError::UnsortedInput { .. }
        | SupplyError::MalformedTimestamp { .. }
        | SupplyError::InvalidInput { .. } => FailureType::Expected,
    }
}

/// Log a per-property pipeline failure with automatic classification
pub fn log_property_failure(property_id: &str, stage: Stage, err: &SupplyError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", stage, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(stage, Some(property_id), &message),
        FailureType::Unexpected => error(stage, Some(property_id), &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a calculation run
pub fn log_run_summary(total: usize, successful: usize, failed: usize, reportable_events: usize) {
    let message = format!(
        "Calculation complete: {}/{} properties successful, {} failed, {} reportable events",
        successful, total, failed, reportable_events
    );

    if failed == 0 {
        info(Stage::Aggregator, None, &message);
    } else if successful == 0 {
        error(Stage::Aggregator, None, &message);
    } else {
        warn(Stage::Aggregator, None, &message);
    }
}
