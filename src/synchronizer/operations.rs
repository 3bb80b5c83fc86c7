use std::fs;
use std::io;
use std::path::Path;

use compio::BufResult;
use compio::fs::File;
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use derive_more::Display;
use snafu::ResultExt;
use tracing::{debug, info};

use super::sync_error::{
    CopySnafu, CreateDirectorySnafu, LogSnafu, MissingSourceSnafu, MissingTargetSnafu,
    PathConflictSnafu, RemoveSnafu, SyncError,
};
use crate::log_sink::LogSink;

/// Size of the chunks streamed from a source file into its replica.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// A mutation applied to the replica tree. The display form prefixes the
/// record written to the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SyncAction {
    #[display("Directory created")]
    CreateDirectory,
    #[display("File copied")]
    CopyFile,
    #[display("File updated")]
    UpdateFile,
    #[display("File deleted")]
    DeleteFile,
    #[display("Directory deleted")]
    DeleteDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The directory to create already exists.
    AlreadyPresent,
    /// The entry to delete was gone before the delete was attempted.
    AlreadyAbsent,
}

/// Result of a single operation that did not abort the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done(SyncAction),
    Skipped(SkipReason),
}

fn record<S: LogSink + ?Sized>(
    sink: &mut S,
    action: SyncAction,
    detail: String,
) -> Result<Outcome, SyncError> {
    let message = format!("{action}: {detail}");
    info!("{message}");
    sink.append(&message).context(LogSnafu)?;
    Ok(Outcome::Done(action))
}

/// Creates `path` unless a directory is already there.
pub async fn create_directory<S: LogSink + ?Sized>(
    path: &Path,
    sink: &mut S,
) -> Result<Outcome, SyncError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => {
            return Ok(Outcome::Skipped(SkipReason::AlreadyPresent));
        }
        Ok(_) => return PathConflictSnafu { path }.fail(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error).context(CreateDirectorySnafu { path }),
    }

    compio::fs::create_dir_all(path)
        .await
        .context(CreateDirectorySnafu { path })?;

    record(sink, SyncAction::CreateDirectory, path.display().to_string())
}

/// Copies a source file that has no counterpart in the replica yet.
pub async fn copy_file<S: LogSink + ?Sized>(
    source: &Path,
    replica: &Path,
    sink: &mut S,
) -> Result<Outcome, SyncError> {
    transfer(source, replica, SyncAction::CopyFile, sink).await
}

/// Overwrites a stale replica file with the full source content.
pub async fn update_file<S: LogSink + ?Sized>(
    source: &Path,
    replica: &Path,
    sink: &mut S,
) -> Result<Outcome, SyncError> {
    transfer(source, replica, SyncAction::UpdateFile, sink).await
}

/// Writes the source content over `replica`.
///
/// Refuses to write through anything but a regular file at `replica`, so a
/// symlink there never redirects the write outside the replica tree.
async fn transfer<S: LogSink + ?Sized>(
    source: &Path,
    replica: &Path,
    action: SyncAction,
    sink: &mut S,
) -> Result<Outcome, SyncError> {
    if !source.is_file() {
        return MissingSourceSnafu { path: source }.fail();
    }

    match fs::symlink_metadata(replica) {
        Ok(metadata) if !metadata.is_file() => return PathConflictSnafu { path: replica }.fail(),
        Ok(_) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(error).context(CopySnafu {
                from: source,
                to: replica,
            });
        }
    }

    let bytes = stream_copy(source, replica).await.context(CopySnafu {
        from: source,
        to: replica,
    })?;
    debug!("Transferred {bytes} bytes to {}", replica.display());

    record(
        sink,
        action,
        format!("{} -> {}", source.display(), replica.display()),
    )
}

/// Streams `source` into `replica`, truncating it first. Returns the number
/// of bytes written.
async fn stream_copy(source: &Path, replica: &Path) -> io::Result<u64> {
    let reader = File::open(source).await?;
    let mut writer = File::create(replica).await?;

    let mut buffer = Vec::with_capacity(COPY_CHUNK_SIZE);
    let mut position = 0u64;

    loop {
        buffer.clear();
        let BufResult(result, returned) = reader.read_at(buffer, position).await;
        buffer = returned;

        let read = result?;
        if read == 0 {
            break;
        }

        let BufResult(result, returned) = writer.write_all_at(buffer, position).await;
        buffer = returned;
        result?;

        position += read as u64;
    }

    writer.sync_all().await?;
    Ok(position)
}

/// Deletes a replica file, symlink or other non-directory entry that has no
/// source counterpart. Symlinks are removed themselves, never followed.
pub async fn delete_file<S: LogSink + ?Sized>(
    path: &Path,
    sink: &mut S,
) -> Result<Outcome, SyncError> {
    if !target_exists(path)? {
        return Ok(Outcome::Skipped(SkipReason::AlreadyAbsent));
    }

    match compio::fs::remove_file(path).await {
        Ok(()) => record(sink, SyncAction::DeleteFile, path.display().to_string()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            MissingTargetSnafu { path }.fail()
        }
        Err(error) => Err(error).context(RemoveSnafu { path }),
    }
}

/// Deletes a replica directory and everything below it as one action.
pub async fn delete_directory<S: LogSink + ?Sized>(
    path: &Path,
    sink: &mut S,
) -> Result<Outcome, SyncError> {
    if !target_exists(path)? {
        return Ok(Outcome::Skipped(SkipReason::AlreadyAbsent));
    }

    match fs::remove_dir_all(path) {
        Ok(()) => record(sink, SyncAction::DeleteDirectory, path.display().to_string()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            MissingTargetSnafu { path }.fail()
        }
        Err(error) => Err(error).context(RemoveSnafu { path }),
    }
}

fn target_exists(path: &Path) -> Result<bool, SyncError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("{} is already gone", path.display());
            Ok(false)
        }
        Err(error) => Err(error).context(RemoveSnafu { path }),
    }
}
