//! Run log for reconstruction stages
//!
//! Diagnostics go through the `log` facade and `env_logger`. This logger is
//! separate: when a `--log-file` is given it appends one line per pipeline
//! stage so a batch of reconstructions leaves a record behind. Without a
//! file it does nothing.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Optional file-backed run log
pub struct Logger {
    /// File handle for log output
    file: Mutex<Option<File>>,
}

impl Logger {
    /// Creates a logger appending to `log_file`
    ///
    /// # Arguments
    ///
    /// * `log_file` - Path to the log file
    ///
    /// # Returns
    ///
    /// A new Logger instance or an error if the file cannot be opened
    pub fn new(log_file: &str) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(Path::new(log_file))?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
        })
    }

    /// Creates a logger that discards everything
    pub fn disabled() -> Self {
        Logger {
            file: Mutex::new(None),
        }
    }

    /// Whether messages are written anywhere
    pub fn is_enabled(&self) -> bool {
        self.file.lock().map(|file| file.is_some()).unwrap_or(false)
    }

    /// Logs a message to the log file
    ///
    /// # Arguments
    ///
    /// * `message` - The message to log
    pub fn log(&self, message: &str) -> io::Result<()> {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Logs a stage transition for a record
    pub fn log_stage(&self, record: &str, stage: &str, detail: &str) -> io::Result<()> {
        if detail.is_empty() {
            self.log(&format!("[{}] {}", record, stage))
        } else {
            self.log(&format!("[{}] {}: {}", record, stage, detail))
        }
    }
}
