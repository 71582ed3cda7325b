//! Startup restore and shutdown coordination.

use std::sync::atomic::Ordering;

use crate::error::Result;
use crate::types::{Event, TaskId, TaskKey, TaskState};

use super::{Persist, TaskRunner};

impl TaskRunner {
    /// Re-submit durable jobs that never reached a terminal state
    ///
    /// Called automatically during initialization. Jobs interrupted
    /// mid-run are re-run from scratch under their persisted id, so
    /// results remain queryable by the id handed out before the restart.
    /// Admission rules (connectivity gate, concurrency limit) apply as for
    /// a fresh submission.
    pub(crate) async fn restore_jobs(&self) -> Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };

        let pending = db.pending_jobs().await?;
        if pending.is_empty() {
            tracing::debug!("No durable jobs to restore");
            return Ok(0);
        }

        let mut restored = 0;
        for job in pending {
            let key = TaskKey::from(job.key.clone());

            let Some(entry) =
                self.runner_state
                    .registry
                    .insert_restored(key.clone(), TaskId(job.id), true)
            else {
                tracing::warn!(
                    task_id = job.id,
                    key = %key,
                    "Skipping restore - key already active"
                );
                continue;
            };

            self.runner_state
                .counters
                .in_flight
                .fetch_add(1, Ordering::SeqCst);

            tracing::info!(task_id = job.id, key = %key, "Restoring durable job");
            self.emit_event(Event::Queued {
                id: entry.id(),
                key,
            });

            self.start_entry(entry, job.input, self.config.runner.default_timeout)
                .await;
            restored += 1;
        }

        Ok(restored)
    }

    /// Gracefully shut down the runner
    ///
    /// Stops accepting new submissions, cancels every in-flight task, and
    /// closes the durable store. Durable jobs are left pending on disk
    /// (their in-memory state is `Cancelled`) so the next process restores
    /// and re-runs them — that is the durability contract.
    ///
    /// Idempotent: a second call returns immediately.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fetch_runner::TaskRunner;
    /// # async fn example(runner: TaskRunner) -> fetch_runner::Result<()> {
    /// runner.shutdown().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn shutdown(&self) -> Result<()> {
        if !self
            .runner_state
            .accepting_new
            .swap(false, Ordering::SeqCst)
        {
            return Ok(());
        }

        tracing::info!("Shutting down task runner");
        self.emit_event(Event::Shutdown);

        // Stop background loops and any workers still waiting for a slot
        self.runner_state.shutdown.cancel();
        self.runner_state.concurrent_limit.close();

        for entry in self.runner_state.registry.active_entries() {
            self.finish_task(&entry, TaskState::Cancelled, Persist::Skip)
                .await;
        }

        if let Some(db) = &self.db {
            db.close().await;
        }

        tracing::info!("Task runner shutdown complete");
        Ok(())
    }
}
