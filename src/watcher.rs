//! Debounced file watcher driving hot reload.
//!
//! Watches the config file through notify's debouncer; each coalesced
//! change triggers a full re-read on the owning handle. Reload outcomes
//! are reported through the handle's event channel, since a fire-and-forget
//! reload has no caller's stack to throw into.

use crate::events::ConfigEvent;
use crate::handle::HandleInner;
use notify::RecommendedWatcher;
use notify_debouncer_mini::{DebouncedEventKind, Debouncer, new_debouncer};
use std::path::Path;
use std::sync::{Weak, mpsc};
use std::time::Duration;
use tracing::{debug, info};

/// Live watch subscription on a config file.
///
/// Dropping the handle stops the debouncer thread; the forwarding and
/// reload tasks then drain their channels and exit on their own.
pub(crate) struct WatchHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
    _forward_task: tokio::task::JoinHandle<()>,
    _reload_task: tokio::task::JoinHandle<()>,
}

/// Start watching `config_path`, debounced by `debounce`.
///
/// The reload task holds only a weak reference to the handle, so an
/// abandoned handle shuts the watcher down instead of leaking it.
pub(crate) fn start(
    inner: Weak<HandleInner>,
    config_path: &Path,
    debounce: Duration,
) -> Result<WatchHandle, notify::Error> {
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(debounce, notify_tx)?;
    debouncer
        .watcher()
        .watch(config_path, notify::RecursiveMode::NonRecursive)?;
    info!("watching config file: {}", config_path.display());

    let (change_tx, mut change_rx) = tokio::sync::mpsc::channel::<Result<(), String>>(8);

    // Forward debounced notify events onto the async side. The loop ends
    // when the debouncer is dropped and the std channel disconnects.
    let forward_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = notify_rx.recv() {
            let forwarded = match result {
                Ok(events) => {
                    let data_changed = events.iter().any(|event| {
                        matches!(
                            event.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    });
                    data_changed.then_some(Ok(()))
                }
                Err(e) => Some(Err(e.to_string())),
            };
            if let Some(message) = forwarded
                && change_tx.blocking_send(message).is_err()
            {
                // Reload task gone, nothing left to notify.
                return;
            }
        }
        debug!("config watcher channel closed, stopping");
    });

    let reload_task = tokio::spawn(async move {
        while let Some(change) = change_rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            match change {
                Ok(()) => match inner.reload_from_disk().await {
                    Ok(true) => inner.events.emit(ConfigEvent::Reload),
                    Ok(false) => {} // handle closed between event and reload
                    Err(e) => inner.events.emit(ConfigEvent::Error(e.to_string())),
                },
                Err(e) => inner.events.emit(ConfigEvent::Error(e)),
            }
        }
    });

    Ok(WatchHandle {
        _debouncer: debouncer,
        _forward_task: forward_task,
        _reload_task: reload_task,
    })
}
