use std::path::Path;

use chrono::{DateTime, Utc};
use snafu::ResultExt;
use tracing::debug;

use super::file_digest::{FileAccessError, FileDigest, UnreadableSnafu};
use crate::ext::{AsyncTryInto, BestEffortPathExt, SystemTimeExt};

/// What the staleness policy looks at for one side of a file pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub digest: FileDigest,
    pub modified: DateTime<Utc>,
}

impl FileSnapshot {
    pub async fn capture(path: &Path) -> Result<Self, FileAccessError> {
        let digest: FileDigest = path.async_try_into().await?;
        let modified = path
            .metadata()
            .and_then(|metadata| metadata.modified())
            .context(UnreadableSnafu {
                path: path.to_path_buf(),
            })?
            .to_utc();

        Ok(Self { digest, modified })
    }

    /// A replica is stale when the contents differ or the source is newer.
    ///
    /// Identical content with a newer source still counts: a touched source
    /// has to propagate its modification time to the replica.
    pub fn replica_is_stale(&self, replica: &FileSnapshot) -> bool {
        self.digest != replica.digest || self.modified > replica.modified
    }
}

/// Returns whether `replica` must be overwritten with `source`.
pub async fn is_stale(source: &Path, replica: &Path) -> Result<bool, FileAccessError> {
    let source_snapshot = FileSnapshot::capture(source).await?;
    let replica_snapshot = FileSnapshot::capture(replica).await?;

    let stale = source_snapshot.replica_is_stale(&replica_snapshot);
    debug!(
        "{} is {} (source {} @ {}, replica {} @ {})",
        replica.best_effort_path_display(),
        if stale { "stale" } else { "current" },
        source_snapshot.digest,
        source_snapshot.modified,
        replica_snapshot.digest,
        replica_snapshot.modified,
    );

    Ok(stale)
}
