//! Task control — cancel, lookup, registry pruning.

use crate::db::JobRecord;
use crate::error::{Error, Result};
use crate::types::{TaskId, TaskInfo, TaskKey, TaskState};

use super::{Persist, TaskRunner};

impl TaskRunner {
    /// Cancel the task registered under a key
    ///
    /// If the task has not reached a terminal state it transitions to
    /// `Cancelled` and every handle observes that. Cancelling a task that
    /// is already terminal is a no-op; the terminal state is preserved and
    /// observers are not invoked again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no task is registered under the key
    /// (it never existed, or its retention window expired).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fetch_runner::TaskRunner;
    /// # async fn example(runner: TaskRunner) -> fetch_runner::Result<()> {
    /// runner.cancel_key(&"https://example.com/a.png".into()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn cancel_key(&self, key: &TaskKey) -> Result<()> {
        let entry = self
            .runner_state
            .registry
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        self.finish_task(&entry, TaskState::Cancelled, Persist::Update)
            .await;

        Ok(())
    }

    /// Snapshot of the task currently registered under a key
    ///
    /// Covers in-flight tasks and terminal ones still inside the retention
    /// window. Returns None once the entry has been pruned.
    pub fn task(&self, key: &TaskKey) -> Option<TaskInfo> {
        self.runner_state.registry.get(key).map(|e| e.info())
    }

    /// Look up a durable job by id in the persistent store
    ///
    /// Works across restarts: a result recorded by a previous process is
    /// still queryable here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no database is configured.
    pub async fn durable_job(&self, id: TaskId) -> Result<Option<JobRecord>> {
        let db = self.db.as_ref().ok_or_else(|| Error::Config {
            message: "durable job lookup requires persistence.database_path".into(),
            key: Some("database_path".into()),
        })?;

        db.get_job(id).await
    }

    /// Drop terminal registry entries older than the retention window
    ///
    /// Returns the number of entries removed. Called periodically by the
    /// status loop; safe to call manually.
    pub fn prune_completed(&self) -> usize {
        self.runner_state
            .registry
            .prune(self.config.runner.retention_window)
    }
}
