use std::ffi::OsStr;
use std::path::PathBuf;

/// Corresponding locations of one directory in the source and replica trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePathPair {
    pub source: PathBuf,
    pub replica: PathBuf,
}

impl TreePathPair {
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
        }
    }

    /// Pair for a child entry. The names only differ by case when the replica
    /// already holds a case-variant of the source name.
    pub fn descend(&self, source_name: &OsStr, replica_name: &OsStr) -> Self {
        Self {
            source: self.source.join(source_name),
            replica: self.replica.join(replica_name),
        }
    }
}
