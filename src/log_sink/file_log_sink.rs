use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use derive_more::Display;
use snafu::{ResultExt, Snafu};

use crate::ext::BestEffortPathExt;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Destination for the audit trail of a synchronization run.
pub trait LogSink {
    /// Appends a single timestamped record.
    fn append(&mut self, message: &str) -> Result<(), LogSinkError>;
}

/// One line of the audit log: `[yyyy-MM-dd HH:mm] message`.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("[{}] {message}", timestamp.format(TIMESTAMP_FORMAT))]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    message: String,
}

impl LogRecord {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }
}

/// Log sink backed by a text file opened in append mode.
///
/// Each record is written with a single `write_all` of the full line so that
/// a record is never interleaved with another.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: File,
}

impl FileLogSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogSinkError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(OpenSnafu { path: path.clone() })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&mut self, message: &str) -> Result<(), LogSinkError> {
        let line = format!("{}\n", LogRecord::now(message));
        self.file.write_all(line.as_bytes()).context(WriteSnafu {
            path: self.path.clone(),
        })
    }
}

#[derive(Debug, Snafu)]
pub enum LogSinkError {
    #[snafu(display("Failed to open log file {}", path.best_effort_path_display()))]
    OpenError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to append to log file {}", path.best_effort_path_display()))]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}
