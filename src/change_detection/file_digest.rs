use std::fmt;
use std::path::{Path, PathBuf};

use compio::BufResult;
use compio::fs::File;
use compio::io::AsyncReadAt;
use md5::{Digest, Md5};
use snafu::{ResultExt, Snafu};

use crate::ext::{AsyncTryFrom, BestEffortPathExt};

/// Size of the chunks streamed through the digest.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// 128-bit MD5 digest of a file's full contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDigest([u8; 16]);

impl FileDigest {
    #[cfg(test)]
    pub fn from_bytes(content: &[u8]) -> Self {
        Self::from_hasher(Md5::new_with_prefix(content))
    }

    fn from_hasher(hasher: Md5) -> Self {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

impl<'a> AsyncTryFrom<&'a Path> for FileDigest {
    type Error = FileAccessError;

    async fn async_try_from(path: &'a Path) -> Result<Self, Self::Error> {
        let metadata = path.metadata().context(UnreadableSnafu {
            path: path.to_path_buf(),
        })?;

        if metadata.is_dir() {
            return Err(FileAccessError::DirectoryError {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path).await.context(UnreadableSnafu {
            path: path.to_path_buf(),
        })?;

        let mut hasher = Md5::new();
        let mut buffer = Vec::with_capacity(READ_CHUNK_SIZE);
        let mut position = 0u64;

        loop {
            buffer.clear();
            let BufResult(result, returned) = file.read_at(buffer, position).await;
            buffer = returned;

            let read = result.context(UnreadableSnafu {
                path: path.to_path_buf(),
            })?;
            if read == 0 {
                break;
            }

            hasher.update(&buffer[..read]);
            position += read as u64;
        }

        Ok(Self::from_hasher(hasher))
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum FileAccessError {
    #[snafu(display("Failed to read file {}", path.best_effort_path_display()))]
    UnreadableError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("The path {} is a directory, not a file", path.best_effort_path_display()))]
    DirectoryError { path: PathBuf },
}
