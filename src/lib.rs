//! # fetch-runner
//!
//! Single-flight asynchronous task runner for one-shot fetch operations,
//! with connectivity gating, exactly-once terminal-state delivery, and an
//! optional durable submission mode that survives process restarts.
//!
//! ## Design Philosophy
//!
//! fetch-runner is designed to be:
//! - **Single-flight** - At most one execution per key; concurrent callers share its result
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Strategy-injectable** - The fetch operation and the worker-execution
//!   backend are both pluggable traits, not parallel code paths
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetch_runner::{Config, SubmitOptions, TaskRunner, TaskState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = TaskRunner::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = runner
//!         .submit(
//!             "https://example.com/a.png",
//!             "https://example.com/a.png",
//!             SubmitOptions::default(),
//!         )
//!         .await?;
//!
//!     match handle.await_terminal().await {
//!         TaskState::Succeeded { value } => println!("loaded {value}"),
//!         other => eprintln!("not loaded: {other:?}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Connectivity gate and reachability sources
pub mod connectivity;
/// Durable job store
pub mod db;
/// Error types
pub mod error;
/// Fetch operation trait and default URL probe
pub mod fetcher;
/// Core task runner implementation (decomposed into focused submodules)
pub mod runner;
/// Periodic status notification loop
pub mod status_loop;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConnectivityConfig, NotificationConfig, PersistenceConfig, RunnerConfig};
pub use connectivity::{ConnectivityGate, ConnectivityWatcher, ReachabilitySource};
pub use db::{Database, JobRecord, JobStatus};
pub use error::{DatabaseError, Error, FetchError, Result};
pub use fetcher::{Fetcher, UrlProbeFetcher};
pub use runner::{ExecutionBackend, TaskHandle, TaskRunner, ThreadBackend, TokioBackend};
pub use status_loop::{LogReporter, StatusLoop, StatusReporter};
pub use types::{
    Event, FailureKind, RunnerSummary, SubmitOptions, TaskId, TaskInfo, TaskKey, TaskState,
};

/// Helper function to run the task runner with graceful signal handling.
///
/// Waits for a termination signal and then calls the runner's `shutdown()`
/// method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use fetch_runner::{Config, TaskRunner, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let runner = TaskRunner::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(runner).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(runner: TaskRunner) -> Result<()> {
    wait_for_signal().await;
    runner.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
