//! Lifecycle event channel.
//!
//! The handle exposes an explicit subscription capability instead of
//! inheriting from a generic emitter: [`crate::ConfigHandle::events`]
//! returns a broadcast receiver, and every emission is fanned out to all
//! live receivers. Background failures that cannot propagate to a caller's
//! stack (deferred writes, watcher-triggered reloads) arrive here as
//! [`ConfigEvent::Error`].

use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the lifecycle event channel. A receiver that lags behind
/// this many events loses the oldest ones, per broadcast semantics.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by a configuration handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// A watcher-triggered re-read committed successfully.
    Reload,
    /// The payload was written to the config file.
    ConfigWritten,
    /// The filesystem watch subscription is established and observing.
    WatcherInitialized,
    /// A background operation (deferred write, watcher reload) failed.
    Error(String),
}

/// Broadcast bus behind the handle's event subscriptions.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ConfigEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Open a new subscription; only events emitted after this call are
    /// delivered to it.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers. A send error only means nobody
    /// is listening, which is fine.
    pub fn emit(&self, event: ConfigEvent) {
        debug!(?event, "config event");
        let _ = self.tx.send(event);
    }
}
