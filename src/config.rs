//! Configuration types for fetch-runner

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Task execution configuration (concurrency, deadlines, retention)
///
/// Groups settings related to how tasks are admitted and executed.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum concurrent fetcher invocations (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Default per-task deadline (default: 30 seconds)
    ///
    /// Enforced by the runner around the fetcher call, independent of
    /// whether the fetcher itself supports interruption. A per-submission
    /// override is available via `SubmitOptions::timeout`.
    #[serde(default = "default_task_timeout", with = "duration_serde")]
    pub default_timeout: Duration,

    /// How long terminal task states are retained for late observers
    /// before being pruned from the registry (default: 60 seconds)
    #[serde(default = "default_retention_window", with = "duration_serde")]
    pub retention_window: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            default_timeout: default_task_timeout(),
            retention_window: default_retention_window(),
        }
    }
}

/// Connectivity gate configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Reachability assumed before the first report from the platform
    /// source arrives (default: true)
    #[serde(default = "default_true")]
    pub assume_reachable: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            assume_reachable: true,
        }
    }
}

/// Durable job store configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the sqlite database backing durable submissions
    /// (None = durable mode disabled)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Status notification loop configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether the status loop runs at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between status reports (default: 5 minutes)
    #[serde(default = "default_notification_interval", with = "duration_serde")]
    pub interval: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_notification_interval(),
        }
    }
}

/// Main configuration for [`crate::TaskRunner`]
///
/// Fields are organized into logical sub-configs:
/// - [`runner`](RunnerConfig) — concurrency, deadlines, retention
/// - [`connectivity`](ConnectivityConfig) — gate behavior
/// - [`notification`](NotificationConfig) — status loop cadence
/// - [`persistence`](PersistenceConfig) — durable job store
///
/// Sub-config fields are flattened for serialization, so the JSON/TOML
/// format stays flat (no nesting), and everything works out of the box
/// with `Config::default()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task execution settings
    #[serde(flatten)]
    pub runner: RunnerConfig,

    /// Connectivity gate settings
    #[serde(flatten)]
    pub connectivity: ConnectivityConfig,

    /// Status notification loop settings
    #[serde(flatten)]
    pub notification: NotificationConfig,

    /// Durable job store settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retention_window() -> Duration {
    Duration::from_secs(60)
}

fn default_notification_interval() -> Duration {
    Duration::from_secs(5 * 60) // 5 minutes
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
pub(crate) mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
