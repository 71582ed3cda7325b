//! Common test utilities for fetch-runner integration tests

use fetch_runner::{Config, TaskRunner};
use std::path::Path;
use std::time::Duration;

/// Config tuned for integration tests: short deadlines, no persistence
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.runner.default_timeout = Duration::from_secs(5);
    config
}

/// Config with a durable store at the given path
#[allow(dead_code)]
pub fn durable_config(db_path: &Path) -> Config {
    let mut config = test_config();
    config.persistence.database_path = Some(db_path.to_path_buf());
    config
}

/// Runner over the default URL probe fetcher
pub async fn start_runner() -> TaskRunner {
    TaskRunner::new(test_config())
        .await
        .expect("runner should initialize")
}
