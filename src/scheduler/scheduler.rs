use std::error::Error;
use std::time::Duration;

use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::log_sink::{LogSink, LogSinkError};
use crate::synchronizer::{PassReport, SyncError, Synchronizer};

/// What a single tick amounted to.
#[derive(Debug)]
pub enum TickOutcome {
    Completed(PassReport),
    /// The pass hit a recoverable error; it was logged and will be retried.
    Aborted,
}

/// Runs one synchronization pass per tick, forever.
pub struct Scheduler<S> {
    synchronizer: Synchronizer<S>,
    interval: Duration,
}

impl<S: LogSink> Scheduler<S> {
    pub fn new(synchronizer: Synchronizer<S>, interval: Duration) -> Self {
        Self {
            synchronizer,
            interval,
        }
    }

    /// Loops until a pass fails in a way that cannot be retried.
    pub async fn run(mut self) -> Result<(), SchedulerError> {
        let roots = self.synchronizer.roots();
        info!(
            "Mirroring {} onto {} every {}s",
            roots.source.display(),
            roots.replica.display(),
            self.interval.as_secs()
        );

        loop {
            if let TickOutcome::Completed(report) = self.tick().await? {
                if report.mutations() == 0 {
                    debug!("Replica is up to date");
                } else {
                    info!("Applied {} changes: {report}", report.mutations());
                }
            }
            compio::time::sleep(self.interval).await;
        }
    }

    pub async fn tick(&mut self) -> Result<TickOutcome, SchedulerError> {
        match self.synchronizer.run_pass().await {
            Ok(report) => Ok(TickOutcome::Completed(report)),
            Err(error) if error.is_fatal() => Err(error).context(FatalPassSnafu),
            Err(error) => {
                let description = describe(&error);
                warn!("Synchronization pass aborted: {description}");
                self.synchronizer
                    .sink_mut()
                    .append(&format!("Synchronization pass aborted: {description}"))
                    .context(RecordAbortSnafu)?;
                Ok(TickOutcome::Aborted)
            }
        }
    }
}

/// Joins an error with all of its sources into one line.
fn describe(error: &(dyn Error + 'static)) -> String {
    let mut description = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display("Synchronization stopped on an unrecoverable error"))]
    FatalPassError { source: SyncError },
    #[snafu(display("Failed to record an aborted synchronization pass"))]
    RecordAbortError { source: LogSinkError },
}
