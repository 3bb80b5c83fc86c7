use std::fs::File;
use std::path::{Path, PathBuf};

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::ext::BestEffortPathExt;

pub const DEFAULT_LOG_FILE_NAME: &str = "documentation.log";

/// Decides which file receives the audit log when the process starts.
///
/// Resolution order:
/// 1. a provided path that already exists is used as is;
/// 2. a provided path whose parent directory exists is created;
/// 3. otherwise `documentation.log` under the base directory (normally the
///    directory of the executable) is used, searching the whole base tree for
///    one left by an earlier run before creating a fresh one.
#[derive(Debug, Clone)]
pub struct LogFileLocator {
    base_dir: PathBuf,
}

/// Where the log file came from, so the caller can announce new files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLogFile {
    Existing(PathBuf),
    Created(PathBuf),
}

impl ResolvedLogFile {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedLogFile::Existing(path) | ResolvedLogFile::Created(path) => path,
        }
    }
}

impl LogFileLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Uses the directory containing the running executable as the base.
    pub fn beside_executable() -> Result<Self, LogFileResolutionError> {
        let executable = std::env::current_exe().context(ExecutableSnafu)?;
        let base_dir = executable
            .parent()
            .context(NoExecutableDirSnafu {
                path: executable.clone(),
            })?
            .to_path_buf();
        Ok(Self::new(base_dir))
    }

    pub fn resolve(
        &self,
        provided: Option<&Path>,
    ) -> Result<ResolvedLogFile, LogFileResolutionError> {
        if let Some(path) = provided {
            if path.is_file() {
                debug!("Using provided log file {}", path.best_effort_path_display());
                return Ok(ResolvedLogFile::Existing(path.to_path_buf()));
            }

            let parent_exists = path
                .parent()
                .map(|parent| parent.as_os_str().is_empty() || parent.is_dir())
                .unwrap_or(false);
            if parent_exists && !path.exists() {
                create_empty(path)?;
                return Ok(ResolvedLogFile::Created(path.to_path_buf()));
            }

            warn!(
                "Log file {} cannot be used, falling back to {}",
                path.best_effort_path_display(),
                DEFAULT_LOG_FILE_NAME
            );
        }

        self.resolve_default()
    }

    fn resolve_default(&self) -> Result<ResolvedLogFile, LogFileResolutionError> {
        let default_path = self.base_dir.join(DEFAULT_LOG_FILE_NAME);
        if default_path.is_file() {
            return Ok(ResolvedLogFile::Existing(default_path));
        }

        if let Some(found) = self.find_previous_log() {
            info!("Found log file {}", found.best_effort_path_display());
            return Ok(ResolvedLogFile::Existing(found));
        }

        create_empty(&default_path)?;
        Ok(ResolvedLogFile::Created(default_path))
    }

    fn find_previous_log(&self) -> Option<PathBuf> {
        WalkDir::new(&self.base_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| entry.file_type().is_file() && entry.file_name() == DEFAULT_LOG_FILE_NAME)
            .map(|entry| entry.into_path())
    }
}

fn create_empty(path: &Path) -> Result<(), LogFileResolutionError> {
    File::create(path).context(CreateSnafu {
        path: path.to_path_buf(),
    })?;
    info!("Log file created at {}", path.best_effort_path_display());
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum LogFileResolutionError {
    #[snafu(display("Failed to locate the running executable"))]
    ExecutableError { source: std::io::Error },
    #[snafu(display("Executable {} has no parent directory", path.best_effort_path_display()))]
    NoExecutableDirError { path: PathBuf },
    #[snafu(display("Failed to create log file {}", path.best_effort_path_display()))]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
}
