use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parses the level names accepted in the config file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

/// Leveled logger writing to stderr and, optionally, a JSON-lines file.
///
/// Stdout is never touched so the report table can be piped cleanly.
pub struct Logger {
    log_file_path: Option<String>,
    console_output: bool,
    min_level: LogLevel,
}

impl Logger {
    pub fn new(log_file_path: Option<&str>, console_output: bool, min_level: LogLevel) -> Self {
        Self {
            log_file_path: log_file_path.map(str::to_string),
            console_output,
            min_level,
        }
    }

    pub fn log(&self, level: LogLevel, module: &str, message: &str, metadata: Option<serde_json::Value>) {
        if !self.should_log(level) {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now().timestamp(),
            level,
            module: module.to_string(),
            message: message.to_string(),
            metadata,
        };

        if self.console_output {
            self.print_to_console(&entry);
        }

        if let Some(path) = self.log_file_path.as_deref() {
            if let Err(e) = write_to_file(path, &entry) {
                eprintln!("Failed to write to log file: {}", e);
            }
        }
    }

    pub fn debug(&self, module: &str, message: &str) {
        self.log(LogLevel::Debug, module, message, None);
    }

    pub fn info(&self, module: &str, message: &str) {
        self.log(LogLevel::Info, module, message, None);
    }

    pub fn warning(&self, module: &str, message: &str) {
        self.log(LogLevel::Warning, module, message, None);
    }

    pub fn error(&self, module: &str, message: &str) {
        self.log(LogLevel::Error, module, message, None);
    }

    pub fn info_with_metadata(&self, module: &str, message: &str, metadata: serde_json::Value) {
        self.log(LogLevel::Info, module, message, Some(metadata));
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn print_to_console(&self, entry: &LogEntry) {
        let local_time: DateTime<Local> = DateTime::from_timestamp(entry.timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&Local);

        let level_str = match entry.level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };

        let color_code = match entry.level {
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warning => "\x1b[33m",  // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
        };

        eprintln!(
            "{}[{}] [{}] {}: {}\x1b[0m",
            color_code,
            local_time.format("%Y-%m-%d %H:%M:%S"),
            level_str,
            entry.module,
            entry.message
        );

        if let Some(ref metadata) = entry.metadata {
            eprintln!("  Metadata: {}", serde_json::to_string(metadata).unwrap_or_default());
        }
    }
}

fn write_to_file(path: &str, entry: &LogEntry) -> io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let json_entry =
        serde_json::to_string(entry).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    writeln!(file, "{}", json_entry)?;
    file.flush()
}

// Global logger instance
use std::sync::OnceLock;

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

pub fn init_logger(log_file_path: Option<&str>, console_output: bool, min_level: LogLevel) {
    GLOBAL_LOGGER
        .set(Logger::new(log_file_path, console_output, min_level))
        .ok();
}

pub fn log_debug(module: &str, message: &str) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.debug(module, message);
    }
}

pub fn log_info(module: &str, message: &str) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.info(module, message);
    }
}

pub fn log_warning(module: &str, message: &str) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.warning(module, message);
    }
}

pub fn log_error(module: &str, message: &str) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.error(module, message);
    }
}

pub fn log_info_with_metadata(module: &str, message: &str, metadata: serde_json::Value) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.info_with_metadata(module, message, metadata);
    }
}

// Convenience macros
#[macro_export]
macro_rules! log_debug {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_debug($module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_info($module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_warning($module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_error($module, &format!($($arg)*))
    };
}
