//! Task submission, admission checks, and worker execution.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Event, FailureKind, SubmitOptions, TaskState};

use super::registry::{SubmitOutcome, TaskEntry};
use super::{Persist, TaskHandle, TaskRunner};

impl TaskRunner {
    /// Submit a fetch task
    ///
    /// At most one task is active per key: if a pending or running task
    /// already exists under `key`, no second execution is started and the
    /// returned handle is bound to the existing task, whose eventual
    /// terminal state is delivered to every holder. A prior task that
    /// reached its terminal state strictly before this call starts a fresh
    /// one.
    ///
    /// If the connectivity gate reports unreachable, the task is recorded
    /// as `Failed` with [`FailureKind::Unavailable`] without invoking the
    /// fetcher, and the handle delivers that terminal state.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `key` or `input` is empty (no task
    ///   is created)
    /// - [`Error::ShuttingDown`] after [`shutdown`](TaskRunner::shutdown)
    /// - [`Error::Config`] for a durable submission without a configured
    ///   database
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fetch_runner::{SubmitOptions, TaskRunner, TaskState};
    /// # async fn example(runner: TaskRunner) -> fetch_runner::Result<()> {
    /// let handle = runner
    ///     .submit("img1", "https://example.com/a.png", SubmitOptions::default())
    ///     .await?;
    ///
    /// match handle.await_terminal().await {
    ///     TaskState::Succeeded { value } => println!("loaded {value}"),
    ///     other => eprintln!("not loaded: {other:?}"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit(
        &self,
        key: impl Into<crate::types::TaskKey>,
        input: impl Into<String>,
        options: SubmitOptions,
    ) -> Result<TaskHandle> {
        let key = key.into();
        let input = input.into();

        if key.is_empty() {
            return Err(Error::InvalidArgument("task key must not be empty".into()));
        }
        if input.is_empty() {
            return Err(Error::InvalidArgument(
                "fetch input must not be empty".into(),
            ));
        }
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }
        if options.durable && self.db.is_none() {
            return Err(Error::Config {
                message: "durable submission requires persistence.database_path".into(),
                key: Some("database_path".into()),
            });
        }

        let entry = match self
            .runner_state
            .registry
            .submit_or_join(key.clone(), options.durable)
        {
            SubmitOutcome::Joined(entry) => {
                tracing::debug!(
                    task_id = entry.id().0,
                    key = %key,
                    "Joining in-flight task"
                );
                return Ok(self.handle_for(entry));
            }
            SubmitOutcome::Fresh(entry) => entry,
        };

        self.runner_state
            .counters
            .in_flight
            .fetch_add(1, Ordering::SeqCst);

        // Persist the job before anything can observe it; a failed insert
        // rolls the reservation back so no task exists for the caller
        if options.durable
            && let Some(db) = &self.db
            && let Err(e) = db.insert_job(entry.id(), key.as_str(), &input).await
        {
            self.runner_state.registry.remove(&key, entry.id());
            self.runner_state
                .counters
                .in_flight
                .fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }

        tracing::info!(
            task_id = entry.id().0,
            key = %key,
            durable = options.durable,
            "Task queued"
        );
        self.emit_event(Event::Queued {
            id: entry.id(),
            key: key.clone(),
        });

        let timeout = options
            .timeout
            .unwrap_or(self.config.runner.default_timeout);
        self.start_entry(Arc::clone(&entry), input, timeout).await;

        Ok(self.handle_for(entry))
    }

    /// Gate-check a fresh entry and dispatch its worker
    ///
    /// Shared between `submit` and durable restore. The connectivity check
    /// happens here, before any off-thread dispatch.
    pub(crate) async fn start_entry(&self, entry: Arc<TaskEntry>, input: String, timeout: Duration) {
        if !self.gate.reachable() {
            tracing::warn!(
                task_id = entry.id().0,
                key = %entry.key(),
                "Connectivity gate closed - failing task without fetch"
            );
            self.finish_task(
                &entry,
                TaskState::Failed {
                    kind: FailureKind::Unavailable,
                    message: "network unreachable".into(),
                },
                Persist::Update,
            )
            .await;
            return;
        }

        let runner = self.clone();
        self.backend
            .spawn(Box::pin(run_task(runner, entry, input, timeout)));
    }

    pub(crate) fn handle_for(&self, entry: Arc<TaskEntry>) -> TaskHandle {
        TaskHandle {
            entry,
            runner: self.clone(),
        }
    }
}

/// Worker future: one fetcher invocation bracketed by admission, deadline,
/// and cancellation
///
/// Runs on the execution backend, never on the submitting context. All
/// fetch failures are captured into a terminal `Failed` state; nothing
/// escapes as a fault.
async fn run_task(runner: TaskRunner, entry: Arc<TaskEntry>, input: String, timeout: Duration) {
    // Wait for a worker slot; bail out if the task was cancelled while
    // queued or the runner shut down
    let _permit = tokio::select! {
        permit = Arc::clone(&runner.runner_state.concurrent_limit).acquire_owned() => {
            match permit {
                Ok(permit) => permit,
                Err(_) => {
                    runner
                        .finish_task(&entry, TaskState::Cancelled, Persist::Skip)
                        .await;
                    return;
                }
            }
        }
        _ = entry.cancel_token().cancelled() => return,
    };

    if !entry.mark_running() {
        return;
    }

    tracing::debug!(task_id = entry.id().0, key = %entry.key(), "Task running");
    runner.emit_event(Event::Started {
        id: entry.id(),
        key: entry.key().clone(),
    });

    if entry.durable()
        && let Some(db) = &runner.db
        && let Err(e) = db.mark_job_running(entry.id()).await
    {
        tracing::warn!(task_id = entry.id().0, error = %e, "Failed to persist running state");
    }

    let outcome = tokio::select! {
        _ = entry.cancel_token().cancelled() => None,
        result = tokio::time::timeout(timeout, runner.fetcher.fetch(&input)) => Some(result),
    };

    let state = match outcome {
        // Whoever cancelled already recorded the terminal state
        None => return,
        Some(Ok(Ok(value))) => TaskState::Succeeded { value },
        Some(Ok(Err(err))) => TaskState::Failed {
            kind: FailureKind::from(&err),
            message: err.to_string(),
        },
        Some(Err(_elapsed)) => TaskState::Failed {
            kind: FailureKind::Timeout,
            message: format!("fetch did not complete within {}s", timeout.as_secs_f32()),
        },
    };

    runner.finish_task(&entry, state, Persist::Update).await;
}
