use std::path::{Path, PathBuf};
use std::time::Duration;

use snafu::{ResultExt, Snafu, ensure};

use crate::cli::Cli;
use crate::ext::BestEffortPathExt;

/// Validated settings the synchronization loop runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub log_file: Option<PathBuf>,
}

impl TryFrom<Cli> for RuntimeConfig {
    type Error = ConfigurationError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        ensure!(!is_blank(&cli.source), BlankPathSnafu { argument: "source" });
        ensure!(!is_blank(&cli.replica), BlankPathSnafu { argument: "replica" });

        ensure!(
            cli.source.is_dir(),
            SourceMissingSnafu {
                path: cli.source.clone()
            }
        );
        ensure!(
            cli.replica.is_dir(),
            ReplicaMissingSnafu {
                path: cli.replica.clone()
            }
        );

        let source = cli.source.canonicalize().context(CanonicalizeSnafu {
            path: cli.source.clone(),
        })?;
        let replica = cli.replica.canonicalize().context(CanonicalizeSnafu {
            path: cli.replica.clone(),
        })?;

        ensure!(source != replica, SamePathsSnafu { path: source });
        ensure!(
            !source.starts_with(&replica) && !replica.starts_with(&source),
            NestedPathsSnafu { source_path: source, replica_path: replica }
        );

        ensure!(cli.interval > 0, NonPositiveIntervalSnafu);

        let log_file = cli.log_file.filter(|path| !is_blank(path));

        Ok(Self {
            source,
            replica,
            interval: Duration::from_secs(cli.interval),
            log_file,
        })
    }
}

fn is_blank(path: &Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}

#[derive(Debug, Snafu)]
pub enum ConfigurationError {
    #[snafu(display("The {argument} directory path cannot be empty"))]
    BlankPathError { argument: &'static str },
    #[snafu(display("Source directory does not exist: {}", path.best_effort_path_display()))]
    SourceMissingError { path: PathBuf },
    #[snafu(display("Replica directory does not exist: {}", path.best_effort_path_display()))]
    ReplicaMissingError { path: PathBuf },
    #[snafu(display("Failed to resolve {}", path.best_effort_path_display()))]
    CanonicalizeError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "Source and replica must be different directories, both are {}",
        path.display()
    ))]
    SamePathsError { path: PathBuf },
    #[snafu(display(
        "Source {} and replica {} must not contain each other",
        source_path.display(),
        replica_path.display()
    ))]
    NestedPathsError {
        source_path: PathBuf,
        replica_path: PathBuf,
    },
    #[snafu(display("Interval must be a positive number of seconds"))]
    NonPositiveIntervalError,
}
