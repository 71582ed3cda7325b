//! Core task runner implementation split into focused submodules.
//!
//! The `TaskRunner` struct and its methods are organized by domain:
//! - [`registry`] - Single-flight task registry and per-task state
//! - [`submit`] - Submission, admission checks, and worker execution
//! - [`control`] - Task control (cancel, lookup, pruning)
//! - [`lifecycle`] - Startup restore and shutdown coordination
//! - [`backend`] - Injectable worker-execution strategies
//! - [`handle`] - Caller-side task handles

mod backend;
mod control;
mod handle;
mod lifecycle;
mod registry;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use backend::{ExecutionBackend, ThreadBackend, TokioBackend};
pub use handle::TaskHandle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::connectivity::ConnectivityGate;
use crate::db::Database;
use crate::error::Result;
use crate::fetcher::{Fetcher, UrlProbeFetcher};
use crate::types::{Event, RunnerSummary, TaskState};

use registry::{TaskEntry, TaskRegistry};

/// Lifetime counters backing [`RunnerSummary`]
#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) in_flight: AtomicUsize,
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) cancelled: AtomicU64,
}

/// Whether a terminal transition is written to the durable store
///
/// Shutdown skips persistence so durable jobs stay pending and are re-run
/// by the next process.
pub(crate) enum Persist {
    Update,
    Skip,
}

/// Task admission and execution state
#[derive(Clone)]
pub(crate) struct RunnerState {
    /// Single-flight registry (the per-key serialization point)
    pub(crate) registry: Arc<TaskRegistry>,
    /// Semaphore bounding concurrent fetcher invocations
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Flag cleared during shutdown so new submissions are rejected
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled once at shutdown; background loops exit on it
    pub(crate) shutdown: CancellationToken,
    /// Lifetime counters for the summary query
    pub(crate) counters: Arc<Counters>,
}

/// Main task runner instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TaskRunner {
    /// Durable job store (None = durable mode disabled)
    pub(crate) db: Option<Arc<Database>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Connectivity gate consulted at admission time
    pub(crate) gate: ConnectivityGate,
    /// Fetch operation invoked by workers
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Worker-execution strategy
    pub(crate) backend: Arc<dyn ExecutionBackend>,
    /// Task admission and execution state
    pub(crate) runner_state: RunnerState,
}

impl TaskRunner {
    /// Create a runner with the default fetcher and execution backend
    ///
    /// Opens the durable job store when one is configured and re-submits
    /// any jobs that never reached a terminal state.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetch_runner::{Config, SubmitOptions, TaskRunner};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let runner = TaskRunner::new(Config::default()).await?;
    ///
    ///     let handle = runner
    ///         .submit("img1", "https://example.com/a.png", SubmitOptions::default())
    ///         .await?;
    ///     let state = handle.await_terminal().await;
    ///     println!("loaded: {:?}", state);
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(UrlProbeFetcher::new()),
            Arc::new(TokioBackend),
        )
        .await
    }

    /// Create a runner with a custom fetcher
    pub async fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        Self::with_parts(config, fetcher, Arc::new(TokioBackend)).await
    }

    /// Create a runner with a custom fetcher and execution backend
    pub async fn with_parts(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Result<Self> {
        // Open the durable store first so id allocation can be seeded
        // past ids already handed out by a previous process
        let db = match &config.persistence.database_path {
            Some(path) => Some(Arc::new(Database::new(path).await?)),
            None => None,
        };

        // Create broadcast channel with buffer size of 1000 events
        // This allows multiple subscribers to receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let gate = ConnectivityGate::new(&config.connectivity);

        let registry = Arc::new(TaskRegistry::new());
        if let Some(db) = &db {
            registry.seed_ids(db.max_job_id().await?);
        }

        let runner_state = RunnerState {
            registry,
            concurrent_limit: Arc::new(tokio::sync::Semaphore::new(
                config.runner.max_concurrent_tasks,
            )),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        };

        tracing::info!(
            fetcher = fetcher.name(),
            backend = backend.name(),
            durable = db.is_some(),
            max_concurrent = config.runner.max_concurrent_tasks,
            "Task runner initialized"
        );

        let runner = Self {
            db,
            event_tx,
            config: Arc::new(config),
            gate,
            fetcher,
            backend,
            runner_state,
        };

        runner.spawn_connectivity_forwarder();

        // Re-run durable jobs interrupted by the previous process
        let restored = runner.restore_jobs().await?;
        if restored > 0 {
            tracing::info!(restored, "Restored durable jobs from previous session");
        }

        Ok(runner)
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all
    /// events independently. Events are buffered, but if a subscriber falls
    /// behind by more than 1000 events it will receive a
    /// `RecvError::Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    ///
    /// The configuration is wrapped in an Arc, so this is a cheap clone.
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The connectivity gate consulted at admission time
    ///
    /// Embedders wire their platform's reachability callback to
    /// [`crate::connectivity::ConnectivityGate::set_reachable`].
    pub fn connectivity(&self) -> &ConnectivityGate {
        &self.gate
    }

    /// Whether new submissions are currently accepted
    pub fn is_accepting(&self) -> bool {
        self.runner_state.accepting_new.load(Ordering::SeqCst)
    }

    /// Cheap, non-blocking runner statistics
    ///
    /// Reads atomics only — safe to poll from a status loop without
    /// touching task locks or anything held by in-flight fetches.
    pub fn summary(&self) -> RunnerSummary {
        let counters = &self.runner_state.counters;
        RunnerSummary {
            in_flight: counters.in_flight.load(Ordering::SeqCst),
            succeeded: counters.succeeded.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            cancelled: counters.cancelled.load(Ordering::SeqCst),
            accepting_new: self.is_accepting(),
        }
    }

    /// Spawn the status notification loop in a background task
    ///
    /// Reports the runner summary through a [`crate::status_loop::LogReporter`]
    /// every `notification.interval` until shutdown.
    pub fn spawn_status_loop(&self) -> tokio::task::JoinHandle<()> {
        let status_loop = crate::status_loop::StatusLoop::with_log_reporter(self.clone());
        tokio::spawn(async move { status_loop.run().await })
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// task execution never depends on anyone listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.runner_state.shutdown
    }

    /// Record a task's terminal state and fan out the consequences
    ///
    /// First writer wins: if the entry is already terminal this is a no-op.
    /// The winner updates counters, emits the matching event, and (for
    /// durable tasks, unless shutting down) persists the outcome.
    pub(crate) async fn finish_task(
        &self,
        entry: &Arc<TaskEntry>,
        state: TaskState,
        persist: Persist,
    ) {
        if !state.is_terminal() {
            return;
        }
        if !entry.try_complete(state.clone()) {
            return;
        }

        let id = entry.id();
        let key = entry.key().clone();
        let counters = &self.runner_state.counters;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &state {
            TaskState::Succeeded { value } => {
                counters.succeeded.fetch_add(1, Ordering::SeqCst);
                tracing::info!(task_id = id.0, key = %key, "Task succeeded");
                self.emit_event(Event::Succeeded {
                    id,
                    key,
                    value: value.clone(),
                });
            }
            TaskState::Failed { kind, message } => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    task_id = id.0,
                    key = %key,
                    kind = kind.as_str(),
                    error = %message,
                    "Task failed"
                );
                self.emit_event(Event::Failed {
                    id,
                    key,
                    kind: *kind,
                    error: message.clone(),
                });
            }
            TaskState::Cancelled => {
                counters.cancelled.fetch_add(1, Ordering::SeqCst);
                tracing::info!(task_id = id.0, key = %key, "Task cancelled");
                self.emit_event(Event::Cancelled { id, key });
            }
            TaskState::Pending | TaskState::Running => {}
        }

        if matches!(persist, Persist::Update)
            && entry.durable()
            && let Some(db) = &self.db
            && let Err(e) = db.complete_job(id, &state).await
        {
            tracing::warn!(
                task_id = id.0,
                error = %e,
                "Failed to persist terminal state"
            );
        }
    }

    /// Forward connectivity transitions to event subscribers until shutdown
    fn spawn_connectivity_forwarder(&self) {
        let runner = self.clone();
        let mut watcher = self.gate.subscribe();
        let shutdown = self.runner_state.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = watcher.changed() => match changed {
                        Some(reachable) => {
                            runner.emit_event(Event::ConnectivityChanged { reachable });
                        }
                        None => break,
                    },
                }
            }
        });
    }
}
