#![deny(missing_docs)]
//! Shared logging utilities for the mirror workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the process logger initializer and a minimal test initializer for the
//! global logger.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Prefix of every log file written by [`initialize`].
pub const LOG_FILE_PREFIX: &str = "mirror_";

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogDestination {
    /// Write to a timestamped file in the log directory.
    #[default]
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Process-wide logger settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Where log records go.
    pub destination: LogDestination,
    /// Directory receiving log files.
    pub dir: PathBuf,
    /// Most verbose level that is recorded.
    pub level: LevelFilter,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            destination: LogDestination::default(),
            dir: PathBuf::from("log"),
            level: LevelFilter::Info,
        }
    }
}

/// Initializes the global logger from `settings`.
///
/// Returns the path of the log file when one was created. A log file that
/// cannot be created is reported on stderr and skipped; any other configured
/// destination still works.
pub fn initialize(settings: &LogSettings) -> Option<PathBuf> {
    let config = build_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    let mut file_path = None;

    if matches!(
        settings.destination,
        LogDestination::Terminal | LogDestination::Both
    ) {
        loggers.push(TermLogger::new(
            settings.level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if matches!(
        settings.destination,
        LogDestination::File | LogDestination::Both
    ) {
        if let Some((path, file_logger)) = create_file_logger(&settings.dir, settings.level, config)
        {
            file_path = Some(path);
            loggers.push(file_logger);
        }
    }

    if loggers.is_empty() {
        return None;
    }
    let _ = CombinedLogger::init(loggers);
    file_path
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

/// File name of a log started at `now`: `mirror_<YYYYmmdd_HHMMSS>.log`.
pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("{LOG_FILE_PREFIX}{}.log", now.format("%Y%m%d_%H%M%S"))
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    dir: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<(PathBuf, Box<WriteLogger<File>>)> {
    if let Err(err) = fs::create_dir_all(dir) {
        eprintln!("Warning: Could not create log directory {:?}: {}", dir, err);
        return None;
    }
    let log_path = dir.join(log_file_name(chrono::Local::now()));
    match File::create(&log_path) {
        Ok(file) => Some((log_path, WriteLogger::new(level, config, file))),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
