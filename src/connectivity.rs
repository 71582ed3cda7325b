//! Connectivity gate — single source of truth for task admission
//!
//! The gate tracks network reachability as reported by a platform
//! [`ReachabilitySource`] and answers two questions: "is submission
//! permitted right now" ([`ConnectivityGate::reachable`]) and "tell me when
//! that changes" ([`ConnectivityGate::subscribe`]).
//!
//! The underlying source is started when the subscriber count goes from
//! zero to one and stopped when the last watcher is dropped, so the
//! platform facility is never held for longer than someone is listening.
//! Source failures are logged and the last successfully observed state is
//! served; they are never raised to callers.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

use crate::config::ConnectivityConfig;

/// Current reachability snapshot
#[derive(Clone, Copy, Debug)]
pub struct ConnectivityState {
    /// Whether the network is currently reachable
    pub reachable: bool,
    /// When the state last changed
    pub changed_at: DateTime<Utc>,
}

/// Handle through which a [`ReachabilitySource`] reports state changes
///
/// Cloneable and independent of the gate's lifetime; reports after the gate
/// is gone are silently dropped.
#[derive(Clone)]
pub struct ReachabilitySink {
    tx: watch::Sender<ConnectivityState>,
}

impl ReachabilitySink {
    /// Report the current reachability; bursts coalesce to last-state-wins
    pub fn report(&self, reachable: bool) {
        self.tx.send_if_modified(|state| {
            if state.reachable == reachable {
                return false;
            }
            tracing::info!(reachable, "Connectivity changed");
            *state = ConnectivityState {
                reachable,
                changed_at: Utc::now(),
            };
            true
        });
    }
}

/// Platform facility delivering network reachability changes
///
/// Implementations wrap whatever change-notification mechanism the host
/// environment offers. `start` is called when the first watcher subscribes
/// and `stop` when the last one unsubscribes.
pub trait ReachabilitySource: Send + Sync {
    /// Begin delivering reachability reports through the sink
    fn start(&self, sink: ReachabilitySink);

    /// Stop delivering reports and release platform resources
    fn stop(&self);

    /// Implementation name, for logging
    fn name(&self) -> &str;
}

/// Source for environments without a reachability facility
///
/// Never reports anything, leaving the gate at its configured initial
/// state (writable via [`ConnectivityGate::set_reachable`]).
pub struct NoOpReachabilitySource;

impl ReachabilitySource for NoOpReachabilitySource {
    fn start(&self, _sink: ReachabilitySink) {}

    fn stop(&self) {}

    fn name(&self) -> &str {
        "noop"
    }
}

struct GateInner {
    state_tx: watch::Sender<ConnectivityState>,
    source: Box<dyn ReachabilitySource>,
    subscribers: AtomicUsize,
}

/// Process-wide connectivity gate (cloneable — state is shared)
#[derive(Clone)]
pub struct ConnectivityGate {
    inner: Arc<GateInner>,
}

impl ConnectivityGate {
    /// Create a gate with no platform source
    ///
    /// The gate starts at `config.assume_reachable` and only changes state
    /// through [`set_reachable`](Self::set_reachable).
    pub fn new(config: &ConnectivityConfig) -> Self {
        Self::with_source(config, Box::new(NoOpReachabilitySource))
    }

    /// Create a gate backed by a platform reachability source
    pub fn with_source(config: &ConnectivityConfig, source: Box<dyn ReachabilitySource>) -> Self {
        let (state_tx, _rx) = watch::channel(ConnectivityState {
            reachable: config.assume_reachable,
            changed_at: Utc::now(),
        });

        tracing::debug!(
            source = source.name(),
            assume_reachable = config.assume_reachable,
            "Connectivity gate initialized"
        );

        Self {
            inner: Arc::new(GateInner {
                state_tx,
                source,
                subscribers: AtomicUsize::new(0),
            }),
        }
    }

    /// Last-known reachability, non-blocking
    pub fn reachable(&self) -> bool {
        self.inner.state_tx.borrow().reachable
    }

    /// Current state snapshot including the transition timestamp
    pub fn state(&self) -> ConnectivityState {
        *self.inner.state_tx.borrow()
    }

    /// Report a reachability change
    ///
    /// Entry point for the platform notification callback; also usable
    /// directly by embedders and tests. Redundant reports are coalesced.
    pub fn set_reachable(&self, reachable: bool) {
        self.sink().report(reachable);
    }

    /// Subscribe to reachability transitions
    ///
    /// Starts the platform source on the first subscription. Dropping the
    /// returned watcher unsubscribes; the source is stopped when the last
    /// watcher goes away.
    pub fn subscribe(&self) -> ConnectivityWatcher {
        let prev = self.inner.subscribers.fetch_add(1, Ordering::SeqCst);
        if prev == 0 {
            tracing::debug!(
                source = self.inner.source.name(),
                "First subscriber - starting reachability source"
            );
            self.inner.source.start(self.sink());
        }

        ConnectivityWatcher {
            rx: self.inner.state_tx.subscribe(),
            gate: Arc::clone(&self.inner),
        }
    }

    fn sink(&self) -> ReachabilitySink {
        ReachabilitySink {
            tx: self.inner.state_tx.clone(),
        }
    }
}

/// Subscription handle for reachability transitions
///
/// Delivers every transition with last-state-wins coalescing. Unsubscribes
/// on drop.
pub struct ConnectivityWatcher {
    rx: watch::Receiver<ConnectivityState>,
    gate: Arc<GateInner>,
}

impl ConnectivityWatcher {
    /// Reachability as of the most recently observed state
    pub fn current(&self) -> bool {
        self.rx.borrow().reachable
    }

    /// Wait for the next transition and return the new reachability
    ///
    /// Returns `None` if the gate itself has been torn down.
    pub async fn changed(&mut self) -> Option<bool> {
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().reachable),
            Err(_) => None,
        }
    }
}

impl Drop for ConnectivityWatcher {
    fn drop(&mut self) {
        let prev = self.gate.subscribers.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            tracing::debug!(
                source = self.gate.source.name(),
                "Last subscriber gone - stopping reachability source"
            );
            self.gate.source.stop();
        }
    }
}
