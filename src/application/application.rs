use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::{ConfigurationError, RuntimeConfig};
use crate::cli::Cli;
use crate::log_sink::{
    FileLogSink, LogFileLocator, LogFileResolutionError, LogSink, LogSinkError, ResolvedLogFile,
};
use crate::scheduler::{Scheduler, SchedulerError};
use crate::synchronizer::Synchronizer;

pub struct Application;

impl Application {
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        let config = RuntimeConfig::try_from(cli).context(ConfigurationSnafu)?;
        debug!("Validated configuration: {config:?}");

        let sink = Self::open_log_sink(&config)?;
        info!("Recording synchronization actions in {}", sink.path().display());

        let synchronizer = Synchronizer::new(config.source, config.replica, sink);
        Scheduler::new(synchronizer, config.interval)
            .run()
            .await
            .context(SynchronizationSnafu)?;

        Ok(())
    }

    fn open_log_sink(config: &RuntimeConfig) -> Result<FileLogSink, ApplicationError> {
        let resolved = LogFileLocator::beside_executable()
            .and_then(|locator| locator.resolve(config.log_file.as_deref()))
            .context(LogFileSnafu)?;

        let mut sink = FileLogSink::open(resolved.path()).context(LogSinkSnafu)?;
        if let ResolvedLogFile::Created(path) = &resolved {
            sink.append(&format!("Log file created at {}", path.display()))
                .context(LogSinkSnafu)?;
        }

        Ok(sink)
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Invalid arguments"))]
    ConfigurationError { source: ConfigurationError },
    #[snafu(display("Could not determine the log file"))]
    LogFileError { source: LogFileResolutionError },
    #[snafu(display("Could not use the log file"))]
    LogSinkError { source: LogSinkError },
    #[snafu(display("Critical failure encountered while synchronizing"))]
    SynchronizationError { source: SchedulerError },
}
