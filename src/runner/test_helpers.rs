//! Shared test helpers for creating TaskRunner instances in tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::Config;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::runner::TaskRunner;

/// What a [`StubFetcher`] does when invoked
pub(crate) enum StubBehavior {
    /// Return the input unchanged
    Succeed,
    /// Return the given error
    Fail(FetchError),
    /// Never resolve (for timeout and cancellation tests)
    Hang,
}

/// Scriptable fetcher that counts its invocations
pub(crate) struct StubFetcher {
    behavior: StubBehavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn succeed() -> Self {
        Self {
            behavior: StubBehavior::Succeed,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn succeed_after(delay: Duration) -> Self {
        Self {
            behavior: StubBehavior::Succeed,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail(error: FetchError) -> Self {
        Self {
            behavior: StubBehavior::Fail(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn hang() -> Self {
        Self {
            behavior: StubBehavior::Hang,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `fetch` has been invoked
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, input: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            StubBehavior::Succeed => Ok(input.to_string()),
            StubBehavior::Fail(error) => Err(error.clone()),
            StubBehavior::Hang => futures::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Config tuned for fast tests: short default timeout, no persistence
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.runner.default_timeout = Duration::from_secs(5);
    config
}

/// Runner with a succeed-immediately stub fetcher and no persistence
pub(crate) async fn create_test_runner() -> TaskRunner {
    create_test_runner_with(Arc::new(StubFetcher::succeed())).await
}

/// Runner with the given fetcher and no persistence
pub(crate) async fn create_test_runner_with(fetcher: Arc<StubFetcher>) -> TaskRunner {
    TaskRunner::with_fetcher(test_config(), fetcher)
        .await
        .unwrap()
}

/// Runner with the given fetcher and a scratch durable store.
/// Returns the runner, the database path, and the tempdir (which must be
/// kept alive).
pub(crate) async fn create_test_runner_with_db(
    fetcher: Arc<StubFetcher>,
) -> (TaskRunner, std::path::PathBuf, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("jobs.db");

    let mut config = test_config();
    config.persistence.database_path = Some(db_path.clone());

    let runner = TaskRunner::with_fetcher(config, fetcher).await.unwrap();
    (runner, db_path, temp_dir)
}
