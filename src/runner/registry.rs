//! Task registry — process-wide map from key to task state.
//!
//! The registry's map mutex is the single serialization point per key: the
//! single-flight check-and-start in `submit` happens entirely under it, so
//! a submit racing a prior task's terminal transition either observes the
//! terminal state (and starts a fresh task) or joins the in-flight one.
//! Entry state itself lives in a `watch` channel; terminal transitions go
//! through [`TaskEntry::try_complete`], which enforces monotonicity.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::types::{TaskId, TaskInfo, TaskKey, TaskState};

/// Transition timestamps and the completion flag, guarded together so a
/// cancel racing a worker cannot interleave between check and send.
struct Lifecycle {
    completed: bool,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// A single task instance owned by the registry
pub(crate) struct TaskEntry {
    id: TaskId,
    key: TaskKey,
    durable: bool,
    created_at: DateTime<Utc>,
    state_tx: watch::Sender<TaskState>,
    cancel: CancellationToken,
    /// Lock-free mirror of `Lifecycle::completed` for registry scans
    terminal: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl TaskEntry {
    fn new(id: TaskId, key: TaskKey, durable: bool) -> Arc<Self> {
        let (state_tx, _rx) = watch::channel(TaskState::Pending);

        Arc::new(Self {
            id,
            key,
            durable,
            created_at: Utc::now(),
            state_tx,
            cancel: CancellationToken::new(),
            terminal: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle {
                completed: false,
                started_at: None,
                completed_at: None,
            }),
        })
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn key(&self) -> &TaskKey {
        &self.key
    }

    pub(crate) fn durable(&self) -> bool {
        self.durable
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current state snapshot
    pub(crate) fn state(&self) -> TaskState {
        self.state_tx.borrow().clone()
    }

    /// Watch receiver for state transitions; a receiver created after the
    /// terminal transition immediately observes the terminal value.
    pub(crate) fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Transition `Pending -> Running`
    ///
    /// Returns false if a terminal state was already recorded (e.g. the
    /// task was cancelled while waiting for a worker slot); the caller must
    /// not proceed with the fetch in that case.
    pub(crate) fn mark_running(&self) -> bool {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if lifecycle.completed {
            return false;
        }
        lifecycle.started_at = Some(Utc::now());
        self.state_tx.send_replace(TaskState::Running);
        true
    }

    /// Record a terminal state
    ///
    /// Exactly one caller wins; all later attempts (a fetch result racing a
    /// cancel, a duplicate cancel) return false and change nothing. The
    /// winning transition also fires the cancellation token so any fetch
    /// still in flight stops being observed.
    pub(crate) fn try_complete(&self, state: TaskState) -> bool {
        debug_assert!(state.is_terminal());

        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if lifecycle.completed {
            return false;
        }
        lifecycle.completed = true;
        lifecycle.completed_at = Some(Utc::now());
        self.terminal.store(true, Ordering::Release);
        self.state_tx.send_replace(state);
        drop(lifecycle);

        self.cancel.cancel();
        true
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .completed_at
    }

    /// Bookkeeping snapshot
    pub(crate) fn info(&self) -> TaskInfo {
        let lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        TaskInfo {
            id: self.id,
            key: self.key.clone(),
            state: self.state_tx.borrow().clone(),
            durable: self.durable,
            created_at: self.created_at,
            started_at: lifecycle.started_at,
            completed_at: lifecycle.completed_at,
        }
    }
}

/// Outcome of a submission against the registry
pub(crate) enum SubmitOutcome {
    /// An active task already exists under the key; the caller shares it
    Joined(Arc<TaskEntry>),
    /// A fresh task was created and must be started by the caller
    Fresh(Arc<TaskEntry>),
}

/// Process-wide map from key to task entry
pub(crate) struct TaskRegistry {
    tasks: Mutex<HashMap<TaskKey, Arc<TaskEntry>>>,
    next_id: AtomicI64,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Advance the id counter past ids already present in the durable store
    pub(crate) fn seed_ids(&self, max_persisted: i64) {
        self.next_id.store(max_persisted + 1, Ordering::SeqCst);
    }

    /// Single-flight check-and-start, atomic under the map lock
    ///
    /// If an active (non-terminal) entry exists under the key, it is
    /// joined. A retained terminal entry is replaced by a fresh one — a
    /// task that completed strictly before this call does not absorb new
    /// submissions.
    pub(crate) fn submit_or_join(&self, key: TaskKey, durable: bool) -> SubmitOutcome {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = tasks.get(&key)
            && !existing.is_terminal()
        {
            return SubmitOutcome::Joined(Arc::clone(existing));
        }

        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let entry = TaskEntry::new(id, key.clone(), durable);
        tasks.insert(key, Arc::clone(&entry));

        SubmitOutcome::Fresh(entry)
    }

    /// Re-create an entry for a durable job restored from the store,
    /// keeping its persisted id
    ///
    /// Returns None if an active entry already occupies the key.
    pub(crate) fn insert_restored(
        &self,
        key: TaskKey,
        id: TaskId,
        durable: bool,
    ) -> Option<Arc<TaskEntry>> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = tasks.get(&key)
            && !existing.is_terminal()
        {
            return None;
        }

        let entry = TaskEntry::new(id, key.clone(), durable);
        tasks.insert(key, Arc::clone(&entry));
        Some(entry)
    }

    /// Look up the entry currently registered under a key
    pub(crate) fn get(&self, key: &TaskKey) -> Option<Arc<TaskEntry>> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Remove an entry, but only if it is still the given task instance
    ///
    /// Used to roll back a reservation when the durable insert fails.
    pub(crate) fn remove(&self, key: &TaskKey, id: TaskId) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.get(key).is_some_and(|e| e.id() == id) {
            tasks.remove(key);
        }
    }

    /// All entries that have not reached a terminal state
    pub(crate) fn active_entries(&self) -> Vec<Arc<TaskEntry>> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| !e.is_terminal())
            .cloned()
            .collect()
    }

    /// Drop terminal entries older than the retention window
    ///
    /// Observers holding a handle keep their entry alive through its Arc;
    /// pruning only ends the period during which a *new* lookup under the
    /// key returns the cached terminal state.
    pub(crate) fn prune(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, entry| {
            if !entry.is_terminal() {
                return true;
            }
            match entry.completed_at() {
                Some(at) => at > cutoff,
                None => true,
            }
        });

        before - tasks.len()
    }
}
