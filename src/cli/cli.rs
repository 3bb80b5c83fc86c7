use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Periodically mirrors a source directory onto a replica directory.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directory to mirror from
    pub source: PathBuf,

    /// Directory kept identical to the source; extra entries are deleted
    pub replica: PathBuf,

    /// Seconds to wait between synchronization passes
    pub interval: u64,

    /// Audit log file, defaults to documentation.log next to the executable
    pub log_file: Option<PathBuf>,

    #[clap(long, short, default_value = "info", value_enum)]
    pub log_level: LogLevel,
}
