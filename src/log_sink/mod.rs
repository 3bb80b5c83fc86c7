//! Append-only audit log of every mutation applied to the replica.
//!
//! The sink is resolved once at startup and then owned by the synchronizer,
//! so there is no process-wide log state.

mod file_log_sink;
mod log_file_locator;

pub use file_log_sink::{FileLogSink, LogSink, LogSinkError};
pub use log_file_locator::{LogFileLocator, LogFileResolutionError, ResolvedLogFile};

#[cfg(test)]
pub use file_log_sink::testing;
