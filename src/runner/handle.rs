//! Caller-side handle to a submitted task.

use std::sync::Arc;

use super::registry::TaskEntry;
use super::{Persist, TaskRunner};
use crate::types::{TaskId, TaskKey, TaskState};

/// Handle to a submitted (possibly shared) task
///
/// Every `submit` call returns a handle; concurrent submissions under the
/// same key return handles bound to the same underlying task. The handle
/// observes the task, it does not own it — dropping a handle has no effect
/// on execution.
#[derive(Clone)]
pub struct TaskHandle {
    pub(crate) entry: Arc<TaskEntry>,
    pub(crate) runner: TaskRunner,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("key", self.key())
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    /// The task's unique id
    pub fn id(&self) -> TaskId {
        self.entry.id()
    }

    /// The task's de-duplication key
    pub fn key(&self) -> &TaskKey {
        self.entry.key()
    }

    /// Current state snapshot
    pub fn state(&self) -> TaskState {
        self.entry.state()
    }

    /// Request cancellation
    ///
    /// If the task has not reached a terminal state it transitions to
    /// `Cancelled` and the in-flight fetch (if any) stops being observed.
    /// Calling after a terminal state is a no-op: the terminal state is
    /// never overwritten and observers are not invoked again.
    pub async fn cancel(&self) {
        self.runner
            .finish_task(&self.entry, TaskState::Cancelled, Persist::Update)
            .await;
    }

    /// Wait for the terminal state
    ///
    /// Resolves exactly once with the terminal state, immediately if the
    /// task is already terminal at the time of the call. Never misses or
    /// duplicates a delivery regardless of subscription timing.
    pub async fn await_terminal(&self) -> TaskState {
        let mut rx = self.entry.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                // The sender lives inside the entry this handle holds, so
                // this only fires during teardown; serve the last value.
                return self.entry.state();
            }
        }
    }

    /// Register a callback invoked exactly once with the terminal state
    ///
    /// The callback runs on a runtime task, whether the task is in flight
    /// or already terminal at registration time.
    pub fn on_terminal<F>(&self, callback: F)
    where
        F: FnOnce(TaskState) + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            let state = handle.await_terminal().await;
            callback(state);
        });
    }
}
