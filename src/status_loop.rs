//! Periodic status notification loop
//!
//! Mirrors the long-running service pattern: as long as the process keeps
//! the loop alive, it reports the runner's current summary on a fixed
//! interval (five minutes by default). The summary query is atomics-only,
//! so polling never contends with in-flight fetches.
//!
//! The loop doubles as the registry's maintenance tick: each round it
//! prunes terminal entries that outlived the retention window.
//!
//! # Example
//!
//! ```no_run
//! use fetch_runner::{Config, StatusLoop, TaskRunner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = TaskRunner::new(Config::default()).await?;
//!
//! let status_loop = StatusLoop::with_log_reporter(runner.clone());
//! tokio::spawn(async move {
//!     status_loop.run().await;
//! });
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{debug, info};

use crate::runner::TaskRunner;
use crate::types::RunnerSummary;

/// Sink for periodic status reports
///
/// Implementations render the summary however the host presents status —
/// a log line, a desktop notification, a metrics push.
pub trait StatusReporter: Send + Sync {
    /// Present one status report
    fn report(&self, summary: &RunnerSummary);
}

/// Default reporter: a structured log line per report
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&self, summary: &RunnerSummary) {
        info!(
            in_flight = summary.in_flight,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            accepting_new = summary.accepting_new,
            "Task runner status"
        );
    }
}

/// Background loop reporting runner status on a fixed interval
pub struct StatusLoop {
    runner: TaskRunner,
    reporter: Arc<dyn StatusReporter>,
}

impl StatusLoop {
    /// Creates a status loop with a custom reporter
    pub fn new(runner: TaskRunner, reporter: Arc<dyn StatusReporter>) -> Self {
        Self { runner, reporter }
    }

    /// Creates a status loop that reports through [`LogReporter`]
    pub fn with_log_reporter(runner: TaskRunner) -> Self {
        Self::new(runner, Arc::new(LogReporter))
    }

    /// Run the loop until shutdown
    ///
    /// Reports immediately, then on every interval tick. Exits promptly
    /// when the runner shuts down rather than waiting out the current
    /// interval.
    pub async fn run(self) {
        let interval = self.runner.get_config().notification.interval;
        info!(interval_secs = interval.as_secs(), "Status loop started");

        loop {
            if !self.runner.is_accepting() {
                info!("Status loop shutting down");
                break;
            }

            let summary = self.runner.summary();
            self.reporter.report(&summary);

            let pruned = self.runner.prune_completed();
            if pruned > 0 {
                debug!(pruned, "Pruned retained terminal tasks");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.runner.shutdown_token().cancelled() => {
                    info!("Status loop shutting down");
                    break;
                }
            }
        }

        info!("Status loop stopped");
    }
}
