//! Injectable worker-execution backends
//!
//! Every task runs its fetch off the caller's execution context; *how* it
//! gets there is a pluggable strategy rather than a set of parallel code
//! paths. The runner only requires "run this future to completion somewhere
//! that isn't the control context".

use futures::future::BoxFuture;

/// Strategy for running a task's worker future off the control context
pub trait ExecutionBackend: Send + Sync {
    /// Run the future to completion on the backend's execution context
    ///
    /// The future is self-contained: it records its own terminal state and
    /// never panics on fetch failure, so backends need no result plumbing.
    fn spawn(&self, fut: BoxFuture<'static, ()>);

    /// Implementation name, for logging
    fn name(&self) -> &str;
}

/// Default backend: a task on the ambient tokio runtime
pub struct TokioBackend;

impl ExecutionBackend for TokioBackend {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        tokio::spawn(fut);
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

/// Backend that dedicates an OS thread per task
///
/// The thread drives the future via `Handle::block_on`, so timers and I/O
/// still run on the captured runtime's drivers. Heavier than
/// [`TokioBackend`]; useful when task work must not share runtime worker
/// threads.
pub struct ThreadBackend {
    handle: tokio::runtime::Handle,
}

impl ThreadBackend {
    /// Capture the current runtime handle
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl Default for ThreadBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionBackend for ThreadBackend {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        let handle = self.handle.clone();
        let spawned = std::thread::Builder::new()
            .name("fetch-runner-worker".to_string())
            .spawn(move || {
                handle.block_on(fut);
            });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn worker thread");
        }
    }

    fn name(&self) -> &str {
        "thread"
    }
}
