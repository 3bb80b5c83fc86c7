use std::path::PathBuf;

use snafu::Snafu;

use crate::change_detection::FileAccessError;
use crate::ext::BestEffortPathExt;
use crate::log_sink::LogSinkError;

/// Everything that can stop a synchronization pass.
///
/// All variants except [`SyncError::LogError`] abort only the current pass;
/// the next tick starts over from the filesystem state.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum SyncError {
    #[snafu(display("Root directory {} is missing", path.best_effort_path_display()))]
    RootMissingError { path: PathBuf },
    #[snafu(display("Failed to list directory {}", path.best_effort_path_display()))]
    ReadDirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to check whether {} is stale", replica.best_effort_path_display()))]
    FileAccessError {
        replica: PathBuf,
        source: FileAccessError,
    },
    #[snafu(display("Source file {} vanished before it could be copied", path.best_effort_path_display()))]
    MissingSourceError { path: PathBuf },
    #[snafu(display("Replica entry {} vanished while being deleted", path.best_effort_path_display()))]
    MissingTargetError { path: PathBuf },
    #[snafu(display("Another kind of entry already occupies {}", path.best_effort_path_display()))]
    PathConflictError { path: PathBuf },
    #[snafu(display("Failed to create directory {}", path.best_effort_path_display()))]
    CreateDirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "Failed to copy {} to {}",
        from.best_effort_path_display(),
        to.best_effort_path_display()
    ))]
    CopyError {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to delete {}", path.best_effort_path_display()))]
    RemoveError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to record a synchronization action"))]
    LogError { source: LogSinkError },
}

impl SyncError {
    /// Whether the process has to stop instead of retrying on the next tick.
    ///
    /// A sink that rejects writes means mutations would go unrecorded.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::LogError { .. })
    }
}
