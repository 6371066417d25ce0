//! Per-field observer registry.
//!
//! Observers subscribe to a dotted field path and receive the value at
//! that path after every successful payload commit, whether or not their
//! own field changed. Each registration gets a stable identifier; the
//! registry keeps insertion order so completion at close time is
//! deterministic. Completion drains the registry and drops the senders,
//! which ends every observer stream.

use crate::fields;
use serde_json::{Map, Value};
use tokio::sync::watch;

/// Stable identifier for a registered field observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct ObserverEntry {
    id: ObserverId,
    field_path: String,
    tx: watch::Sender<Value>,
}

/// Ordered registry of (field path, observer) pairs.
///
/// One field path may appear multiple times; independent subscriptions to
/// the same path are all tracked and all notified.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    entries: Vec<ObserverEntry>,
}

impl ObserverRegistry {
    /// Register an observer seeded with the field's current value and
    /// return its id plus the receiving half of the stream.
    pub fn register(
        &mut self,
        field_path: String,
        initial: Value,
    ) -> (ObserverId, watch::Receiver<Value>) {
        let id = ObserverId(self.next_id);
        self.next_id += 1;

        let (tx, mut rx) = watch::channel(initial);
        // The captured snapshot is the stream's first item.
        rx.mark_changed();
        self.entries.push(ObserverEntry { id, field_path, tx });
        (id, rx)
    }

    /// Remove an observer by id; dropping its sender completes the stream.
    /// Returns true if the id was registered.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Push, to each observer in insertion order, the value resolved at
    /// its field path under the new payload (`Null` when absent).
    ///
    /// Entries whose receivers are gone are pruned first.
    pub fn notify_all(&mut self, payload: &Map<String, Value>) {
        self.entries.retain(|entry| !entry.tx.is_closed());
        for entry in &self.entries {
            let value = fields::lookup(payload, &entry.field_path)
                .cloned()
                .unwrap_or(Value::Null);
            entry.tx.send_replace(value);
        }
    }

    /// Complete every observer stream, in insertion order, and clear the
    /// registry.
    pub fn complete_all(&mut self) {
        for entry in self.entries.drain(..) {
            drop(entry.tx);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Push-based subscription to a single field of the payload.
///
/// The first received item is the value captured at subscription time;
/// each subsequent item is the value at the field path after a successful
/// payload commit. Slow consumers observe the latest value, not every
/// intermediate one. [`recv`](Self::recv) returns `None` once the stream
/// completes (explicit removal or handle close).
#[derive(Debug)]
pub struct FieldObserver {
    id: ObserverId,
    field_path: String,
    rx: watch::Receiver<Value>,
}

impl FieldObserver {
    pub(crate) fn new(id: ObserverId, field_path: String, rx: watch::Receiver<Value>) -> Self {
        Self { id, field_path, rx }
    }

    /// Identifier to pass to [`crate::ConfigHandle::unobserve`].
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The dotted field path this observer is registered for.
    pub fn field_path(&self) -> &str {
        &self.field_path
    }

    /// Latest value without waiting.
    pub fn latest(&self) -> Value {
        self.rx.borrow().clone()
    }

    /// Wait for the next value. `None` means the stream has completed and
    /// no further notifications will occur.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
