//! Core types for fetch-runner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a task instance
///
/// For durable submissions this doubles as the job identifier in the
/// persistent store, so results stay queryable after a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode so TaskId binds directly in queries
impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// De-duplication key for task submissions
///
/// The key is opaque to the runner: concurrent submissions under the same
/// key share one execution (single-flight). Callers that want independent
/// attempts at the same input can append their own disambiguator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    /// Create a new TaskKey
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty (rejected at the submit boundary)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TaskKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for TaskKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a task reached the `Failed` terminal state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connectivity gate was closed; the fetcher was never invoked
    Unavailable,
    /// Input was not a well-formed URL
    MalformedInput,
    /// Connection attempt failed
    Network,
    /// The deadline elapsed before the fetcher resolved
    Timeout,
}

impl FailureKind {
    /// Stable string form, used by the durable store
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::MalformedInput => "malformed_input",
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
        }
    }

    /// Parse the stable string form
    ///
    /// Unknown strings decode as `Network` so corrupted rows surface as a
    /// visible failure rather than a panic.
    pub fn parse(s: &str) -> Self {
        match s {
            "unavailable" => FailureKind::Unavailable,
            "malformed_input" => FailureKind::MalformedInput,
            "timeout" => FailureKind::Timeout,
            _ => FailureKind::Network,
        }
    }
}

impl From<&crate::error::FetchError> for FailureKind {
    fn from(err: &crate::error::FetchError) -> Self {
        match err {
            crate::error::FetchError::MalformedInput(_) => FailureKind::MalformedInput,
            crate::error::FetchError::Network(_) => FailureKind::Network,
            crate::error::FetchError::Timeout(_) => FailureKind::Timeout,
        }
    }
}

/// Lifecycle state of a task
///
/// Transitions are monotonic: `Pending -> Running -> terminal`, where
/// terminal is exactly one of `Succeeded`, `Failed`, or `Cancelled`. Once a
/// terminal state is recorded no further transition is observable for that
/// task instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, waiting for a worker slot
    Pending,
    /// Fetcher invocation in flight
    Running,
    /// Fetch completed; carries the loaded value
    Succeeded {
        /// The fetched result (the validated input URI)
        value: String,
    },
    /// Fetch failed; distinguishable from cancellation
    Failed {
        /// Failure classification
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
    /// Cancelled by the caller before a fetch outcome was recorded
    Cancelled,
}

impl TaskState {
    /// Whether this state is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded { .. } | TaskState::Failed { .. } | TaskState::Cancelled
        )
    }
}

/// Options for submitting a task
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmitOptions {
    /// Persist the submission so it survives process death and is re-run
    /// on the next startup (requires a configured database)
    #[serde(default)]
    pub durable: bool,

    /// Per-task deadline override (None = use the configured default)
    #[serde(default, with = "crate::config::optional_duration_serde")]
    pub timeout: Option<Duration>,
}

/// Snapshot of a task's bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Unique task identifier
    pub id: TaskId,

    /// De-duplication key
    pub key: TaskKey,

    /// Current state
    pub state: TaskState,

    /// Whether the submission was durable
    pub durable: bool,

    /// When the task was accepted
    pub created_at: DateTime<Utc>,

    /// When the fetcher was invoked (None if never started)
    pub started_at: Option<DateTime<Utc>>,

    /// When the terminal state was recorded (None while in flight)
    pub completed_at: Option<DateTime<Utc>>,
}

/// Cheap, non-blocking runner statistics
///
/// Backed by atomics only, so a polling loop can read it without touching
/// task locks or anything held by in-flight fetches.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RunnerSummary {
    /// Tasks currently pending or running
    pub in_flight: usize,

    /// Tasks that reached `Succeeded` since startup
    pub succeeded: u64,

    /// Tasks that reached `Failed` since startup
    pub failed: u64,

    /// Tasks that reached `Cancelled` since startup
    pub cancelled: u64,

    /// Whether new submissions are accepted
    pub accepting_new: bool,
}

/// Event emitted during task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted into the registry
    Queued {
        /// Task ID
        id: TaskId,
        /// Task key
        key: TaskKey,
    },

    /// Fetcher invocation started
    Started {
        /// Task ID
        id: TaskId,
        /// Task key
        key: TaskKey,
    },

    /// Task reached `Succeeded`
    Succeeded {
        /// Task ID
        id: TaskId,
        /// Task key
        key: TaskKey,
        /// Fetched value
        value: String,
    },

    /// Task reached `Failed`
    Failed {
        /// Task ID
        id: TaskId,
        /// Task key
        key: TaskKey,
        /// Failure classification
        kind: FailureKind,
        /// Error message
        error: String,
    },

    /// Task reached `Cancelled`
    Cancelled {
        /// Task ID
        id: TaskId,
        /// Task key
        key: TaskKey,
    },

    /// Network reachability changed
    ConnectivityChanged {
        /// New reachability state
        reachable: bool,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // --- TaskState terminality ---

    #[test]
    fn pending_and_running_are_not_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn succeeded_failed_cancelled_are_terminal() {
        assert!(
            TaskState::Succeeded {
                value: "https://example.com/a.png".into()
            }
            .is_terminal()
        );
        assert!(
            TaskState::Failed {
                kind: FailureKind::Network,
                message: "refused".into()
            }
            .is_terminal()
        );
        assert!(TaskState::Cancelled.is_terminal());
    }

    // --- FailureKind string encoding ---

    #[test]
    fn failure_kind_round_trips_through_str_for_all_variants() {
        let cases = [
            (FailureKind::Unavailable, "unavailable"),
            (FailureKind::MalformedInput, "malformed_input"),
            (FailureKind::Network, "network"),
            (FailureKind::Timeout, "timeout"),
        ];

        for (variant, expected) in cases {
            assert_eq!(variant.as_str(), expected);
            assert_eq!(FailureKind::parse(expected), variant);
        }
    }

    #[test]
    fn failure_kind_parse_unknown_defaults_to_network() {
        assert_eq!(
            FailureKind::parse("garbage"),
            FailureKind::Network,
            "unknown kind must fall back to Network so corrupted rows surface visibly"
        );
    }

    // --- TaskId conversions ---

    #[test]
    fn task_id_from_i64_and_back() {
        let id = TaskId::from(42_i64);
        let raw: i64 = id.into();
        assert_eq!(raw, 42);
    }

    #[test]
    fn task_id_from_str_parses_valid_integer() {
        let id = TaskId::from_str("123").unwrap();
        assert_eq!(id.get(), 123);
    }

    #[test]
    fn task_id_from_str_rejects_non_numeric() {
        assert!(TaskId::from_str("abc").is_err());
        assert!(TaskId::from_str("").is_err());
    }

    #[test]
    fn task_id_display_matches_inner_value() {
        assert_eq!(TaskId::new(999).to_string(), "999");
    }

    // --- TaskKey ---

    #[test]
    fn task_key_from_str_preserves_value() {
        let key = TaskKey::from("https://example.com/a.png");
        assert_eq!(key.as_str(), "https://example.com/a.png");
        assert!(!key.is_empty());
    }

    #[test]
    fn empty_task_key_reports_empty() {
        assert!(TaskKey::from("").is_empty());
    }

    // --- Event serialization ---

    #[test]
    fn event_serializes_with_snake_case_tag() {
        let event = Event::Failed {
            id: TaskId(7),
            key: TaskKey::from("k"),
            kind: FailureKind::Timeout,
            error: "deadline elapsed".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn task_state_serializes_with_state_tag() {
        let state = TaskState::Succeeded {
            value: "https://example.com/a.png".into(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["value"], "https://example.com/a.png");
    }
}
