//! The configuration handle: loader, validated store, and lifecycle.
//!
//! A [`ConfigHandle`] moves between two states. It starts *unread*: only
//! construction and `read()` are permitted. A successful `read()` makes it
//! *active*: fields can be read and mutated, the payload persisted, fields
//! observed, and the hot-reload watcher armed. `close()` flushes, tears
//! down the watcher and observers, and returns the handle to *unread*,
//! from which `read()` re-activates it.
//!
//! Every payload transition funnels through one validating commit
//! primitive: validate against the compiled schema, swap the payload,
//! notify observers. A payload that fails validation is never visible.

use crate::error::{ConfigError, Result};
use crate::events::{ConfigEvent, EventBus};
use crate::fields;
use crate::observers::{FieldObserver, ObserverId, ObserverRegistry};
use crate::paths;
use crate::schema::{self, CompiledSchema};
use crate::watcher::{self, WatchHandle};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Indentation used when persisting the payload.
const PRETTY_INDENT: &[u8] = b"    ";

/// Default debounce interval for the hot-reload watcher.
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(500);

/// Construction-time options for a [`ConfigHandle`].
///
/// All flags are captured at construction and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// Synthesize (and schedule persistence of) a default payload when the
    /// config file is missing (default: false).
    pub create_on_missing: bool,

    /// Arm the watcher at the end of the first successful `read()`
    /// (default: false).
    pub auto_reload: bool,

    /// Schedule a lazy disk write after every successful `set()`
    /// (default: false).
    pub write_on_set: bool,

    /// Debounce interval for the file watcher (default: 500ms).
    pub reload_delay: Duration,

    /// Schema used when no schema file exists on disk (default: a
    /// permissive built-in that accepts any object).
    pub default_schema: Option<Map<String, Value>>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            create_on_missing: false,
            auto_reload: false,
            write_on_set: false,
            reload_delay: DEFAULT_RELOAD_DELAY,
            default_schema: None,
        }
    }
}

impl ConfigOptions {
    /// Enable creating a default payload when the file is missing.
    pub fn with_create_on_missing(mut self, enabled: bool) -> Self {
        self.create_on_missing = enabled;
        self
    }

    /// Enable arming the watcher after the first successful read.
    pub fn with_auto_reload(mut self, enabled: bool) -> Self {
        self.auto_reload = enabled;
        self
    }

    /// Enable lazy persistence after every successful `set()`.
    pub fn with_write_on_set(mut self, enabled: bool) -> Self {
        self.write_on_set = enabled;
        self
    }

    /// Set the watcher debounce interval.
    pub fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    /// Set the schema to use when no schema file is found on disk.
    pub fn with_default_schema(mut self, schema: Map<String, Value>) -> Self {
        self.default_schema = Some(schema);
        self
    }
}

/// Mutable state guarded by the handle's mutex.
struct HandleState {
    has_been_read: bool,
    payload: Map<String, Value>,
    schema: Option<CompiledSchema>,
    observers: ObserverRegistry,
    watcher: Option<WatchHandle>,
    write_pending: bool,
}

impl HandleState {
    fn new() -> Self {
        Self {
            has_been_read: false,
            payload: Map::new(),
            schema: None,
            observers: ObserverRegistry::default(),
            watcher: None,
            write_pending: false,
        }
    }
}

/// Shared core of a handle. The watcher's reload task holds this weakly.
pub(crate) struct HandleInner {
    config_path: PathBuf,
    schema_path: PathBuf,
    options: ConfigOptions,
    pub(crate) events: EventBus,
    state: Mutex<HandleState>,
}

impl HandleInner {
    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap()
    }

    /// The validating commit primitive. Every payload transition funnels
    /// through here: validate, swap, notify. On failure the internal
    /// payload is left unchanged.
    fn commit(state: &mut HandleState, candidate: Map<String, Value>) -> Result<()> {
        if !state.has_been_read {
            return Err(ConfigError::NotRead {
                operation: "assign a payload",
            });
        }
        let Some(compiled) = state.schema.as_ref() else {
            return Err(ConfigError::NotRead {
                operation: "assign a payload",
            });
        };

        let candidate = Value::Object(candidate);
        compiled.check(&candidate)?;
        if let Value::Object(next) = candidate {
            state.payload = next;
        }
        state.observers.notify_all(&state.payload);
        Ok(())
    }

    /// Full loader protocol. Also the hot-reload path: a re-read parses
    /// both files again, recompiles the schema, and recommits the payload
    /// through the same validation gate.
    async fn read_from_disk(
        self: &Arc<Self>,
        default_payload: Option<Map<String, Value>>,
    ) -> Result<()> {
        // Step 1: config acquisition. Missing-file is interpreted only
        // here, and only when creation is permitted; every other failure
        // propagates.
        let (candidate, must_persist) = match tokio::fs::read(&self.config_path).await {
            Ok(bytes) => {
                let document: Value =
                    serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse {
                        path: self.config_path.clone(),
                        source: e,
                    })?;
                match document {
                    Value::Object(map) => (map, false),
                    other => {
                        return Err(ConfigError::PayloadShape {
                            actual: fields::json_type_name(&other),
                        });
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound && self.options.create_on_missing => {
                debug!(
                    "config file missing, synthesizing default payload: {}",
                    self.config_path.display()
                );
                let fallback = match default_payload {
                    Some(payload) => payload,
                    None => self.lock().payload.clone(),
                };
                (fallback, true)
            }
            Err(e) => return Err(ConfigError::io(&self.config_path, e)),
        };

        // Step 2: schema acquisition. A missing schema file falls back to
        // the construction-time default, then to the permissive built-in.
        let schema_doc = match tokio::fs::read(&self.schema_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse {
                path: self.schema_path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let fallback = self
                    .options
                    .default_schema
                    .clone()
                    .unwrap_or_else(schema::permissive_schema);
                Value::Object(fallback)
            }
            Err(e) => return Err(ConfigError::io(&self.schema_path, e)),
        };

        // Step 3: recompile. Re-reads always recompile, so schema-file
        // edits take effect on reload.
        let compiled = CompiledSchema::compile(&schema_doc)?;

        // Step 4: mark read, then commit through the validating setter.
        // The setter requires has_been_read; a validation failure rolls it
        // back so the handle never claims to be read with an invalid
        // payload. The previous schema is restored alongside, keeping
        // payload and schema mutually consistent.
        {
            let mut state = self.lock();
            let previous_schema = state.schema.replace(compiled);
            state.has_been_read = true;
            if let Err(e) = Self::commit(&mut state, candidate) {
                state.has_been_read = false;
                state.schema = previous_schema;
                return Err(e);
            }
        }
        info!("configuration read: {}", self.config_path.display());

        // Step 5: a synthesized payload is persisted without blocking the
        // caller.
        if must_persist {
            self.schedule_lazy_write();
        }

        // Step 6: arm the watcher (idempotent on re-read).
        if self.options.auto_reload {
            self.arm_watcher()?;
        }

        Ok(())
    }

    /// Watcher-triggered re-read. Returns `Ok(false)` when the handle was
    /// closed between the change event and the reload.
    pub(crate) async fn reload_from_disk(self: &Arc<Self>) -> Result<bool> {
        if !self.lock().has_been_read {
            debug!("change event after close, reload skipped");
            return Ok(false);
        }
        self.read_from_disk(None).await?;
        Ok(true)
    }

    /// Serialize the current payload and overwrite the config file.
    async fn flush_to_disk(&self) -> Result<()> {
        let bytes = {
            let state = self.lock();
            if !state.has_been_read {
                return Err(ConfigError::NotRead {
                    operation: "write the configuration",
                });
            }
            pretty_bytes(&state.payload)?
        };

        tokio::fs::write(&self.config_path, bytes)
            .await
            .map_err(|e| ConfigError::io(&self.config_path, e))?;

        debug!("configuration written: {}", self.config_path.display());
        self.events.emit(ConfigEvent::ConfigWritten);
        Ok(())
    }

    /// Schedule a flush after the current scheduler turn. Consecutive
    /// calls before the deferred write runs coalesce into one.
    fn schedule_lazy_write(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            if state.write_pending {
                return;
            }
            state.write_pending = true;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            {
                let mut state = inner.lock();
                state.write_pending = false;
                if !state.has_been_read {
                    // Closed before the deferred write ran.
                    return;
                }
            }
            if let Err(e) = inner.flush_to_disk().await {
                warn!("deferred config write failed: {e}");
                inner.events.emit(ConfigEvent::Error(e.to_string()));
            }
        });
    }

    /// Idempotent arm operation: `Ok(false)` when already armed.
    fn arm_watcher(self: &Arc<Self>) -> Result<bool> {
        {
            let state = self.lock();
            if !state.has_been_read {
                return Err(ConfigError::NotRead {
                    operation: "arm auto-reload",
                });
            }
            if state.watcher.is_some() {
                return Ok(false);
            }
        }

        let watch = watcher::start(
            Arc::downgrade(self),
            &self.config_path,
            self.options.reload_delay,
        )?;

        {
            let mut state = self.lock();
            if state.watcher.is_some() {
                // Lost an arming race; the fresh subscription is dropped.
                return Ok(false);
            }
            state.watcher = Some(watch);
        }
        self.events.emit(ConfigEvent::WatcherInitialized);
        Ok(true)
    }
}

/// Handle to a schema-validated JSON configuration file.
///
/// Cloning is cheap; clones share the same underlying state, so a clone
/// can be moved into a task while the original keeps serving reads.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigHandle")
            .field("config_path", &self.inner.config_path)
            .field("has_been_read", &self.has_been_read())
            .field("auto_reload_active", &self.auto_reload_active())
            .finish()
    }
}

impl ConfigHandle {
    /// Create a handle for `path` with default options.
    ///
    /// Validates the path shape only; no filesystem access happens until
    /// [`read`](Self::read).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(path, ConfigOptions::default())
    }

    /// Create a handle with explicit options.
    pub fn with_options(path: impl Into<PathBuf>, options: ConfigOptions) -> Result<Self> {
        let config_path = path.into();
        paths::validate_config_path(&config_path)?;
        let schema_path = paths::schema_path_for(&config_path);

        Ok(Self {
            inner: Arc::new(HandleInner {
                config_path,
                schema_path,
                options,
                events: EventBus::new(),
                state: Mutex::new(HandleState::new()),
            }),
        })
    }

    /// Path of the config file this handle manages.
    pub fn config_path(&self) -> &Path {
        &self.inner.config_path
    }

    /// Derived path of the sibling schema file.
    pub fn schema_path(&self) -> &Path {
        &self.inner.schema_path
    }

    /// True after a successful `read()` and until `close()`.
    pub fn has_been_read(&self) -> bool {
        self.inner.lock().has_been_read
    }

    /// True while a watch subscription is live.
    pub fn auto_reload_active(&self) -> bool {
        self.inner.lock().watcher.is_some()
    }

    /// Subscribe to lifecycle events. Only events emitted after this call
    /// are delivered.
    pub fn events(&self) -> broadcast::Receiver<ConfigEvent> {
        self.inner.events.subscribe()
    }

    /// Load (or reload) config and schema from disk.
    ///
    /// When the config file is missing and `create_on_missing` is set, the
    /// payload falls back to `default_payload` (or the current in-memory
    /// payload) and its persistence is scheduled. A later `read()` is a
    /// full cold reload and is exactly what the hot-reload watcher
    /// triggers internally.
    pub async fn read(&self, default_payload: Option<Map<String, Value>>) -> Result<()> {
        self.inner.read_from_disk(default_payload).await
    }

    /// Deep, independent copy of the current payload; the empty mapping
    /// when the handle has not been read.
    pub fn payload(&self) -> Map<String, Value> {
        let state = self.inner.lock();
        if state.has_been_read {
            state.payload.clone()
        } else {
            Map::new()
        }
    }

    /// Replace the whole payload through the validating commit primitive.
    ///
    /// On validation failure the error enumerates every violation and the
    /// internal payload is left unchanged.
    pub fn set_payload(&self, payload: Map<String, Value>) -> Result<()> {
        let mut state = self.inner.lock();
        HandleInner::commit(&mut state, payload)
    }

    /// Resolve a dotted field path against the payload. Returns `None`
    /// for a missing leaf, never an error.
    pub fn get(&self, field_path: &str) -> Result<Option<Value>> {
        let state = self.inner.lock();
        if !state.has_been_read {
            return Err(ConfigError::NotRead {
                operation: "get a field",
            });
        }
        Ok(fields::lookup(&state.payload, field_path).cloned())
    }

    /// Set the value at a dotted field path, re-validating the resulting
    /// tree. Schedules a lazy disk write when `write_on_set` is enabled.
    pub fn set(&self, field_path: &str, value: Value) -> Result<()> {
        {
            let mut state = self.inner.lock();
            if !state.has_been_read {
                return Err(ConfigError::NotRead {
                    operation: "set a field",
                });
            }
            let mut next = state.payload.clone();
            fields::assign(&mut next, field_path, value);
            HandleInner::commit(&mut state, next)?;
        }

        if self.inner.options.write_on_set {
            self.inner.schedule_lazy_write();
        }
        Ok(())
    }

    /// Persist the current payload to the config file, pretty-printed.
    /// Emits [`ConfigEvent::ConfigWritten`] on success.
    pub async fn write_to_disk(&self) -> Result<()> {
        self.inner.flush_to_disk().await
    }

    /// Schedule [`write_to_disk`](Self::write_to_disk) for after the
    /// current scheduler turn, so rapid mutations coalesce into one write.
    /// A deferred failure surfaces as [`ConfigEvent::Error`].
    pub fn lazy_write(&self) -> Result<()> {
        if !self.inner.lock().has_been_read {
            return Err(ConfigError::NotRead {
                operation: "write the configuration",
            });
        }
        self.inner.schedule_lazy_write();
        Ok(())
    }

    /// Arm the hot-reload watcher. Returns `Ok(false)` when already armed.
    /// Emits [`ConfigEvent::WatcherInitialized`] once the subscription is
    /// live.
    pub fn setup_auto_reload(&self) -> Result<bool> {
        self.inner.arm_watcher()
    }

    /// Observe a single field. The observer's first item is the value
    /// captured now; each subsequent item arrives after a successful
    /// payload commit, whether or not the observed field changed.
    pub fn observable_of(&self, field_path: &str) -> Result<FieldObserver> {
        let mut state = self.inner.lock();
        if !state.has_been_read {
            return Err(ConfigError::NotRead {
                operation: "observe a field",
            });
        }
        let initial = fields::lookup(&state.payload, field_path)
            .cloned()
            .unwrap_or(Value::Null);
        let (id, rx) = state.observers.register(field_path.to_string(), initial);
        Ok(FieldObserver::new(id, field_path.to_string(), rx))
    }

    /// Remove a field observer eagerly; its stream completes. Returns
    /// false if the id was not registered (already removed or completed).
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.lock().observers.remove(id)
    }

    /// Tear the handle down: best-effort final flush, release the watch
    /// subscription, complete every observer, and return to the unread
    /// state. The handle may be `read()` again afterwards.
    pub async fn close(&self) -> Result<()> {
        if !self.inner.lock().has_been_read {
            return Err(ConfigError::NotRead {
                operation: "close the handle",
            });
        }

        // Best-effort final flush; a failure is reported but does not
        // abort teardown.
        if let Err(e) = self.inner.flush_to_disk().await {
            warn!("final flush failed during close: {e}");
            self.inner.events.emit(ConfigEvent::Error(e.to_string()));
        }

        // Release the watch subscription outside the state lock; dropping
        // the debouncer joins its worker thread.
        let watch = self.inner.lock().watcher.take();
        drop(watch);

        let mut state = self.inner.lock();
        let completed = state.observers.len();
        state.observers.complete_all();
        state.payload = Map::new();
        state.schema = None;
        state.write_pending = false;
        state.has_been_read = false;
        info!(
            "configuration handle closed: {} ({completed} observers completed)",
            self.inner.config_path.display()
        );
        Ok(())
    }
}

/// Serialize a payload as pretty-printed JSON with a stable 4-space
/// indent and a trailing newline.
fn pretty_bytes(payload: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    let formatter = PrettyFormatter::with_indent(PRETTY_INDENT);
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    payload
        .serialize(&mut serializer)
        .map_err(|e| ConfigError::Serialize { source: e })?;
    buf.push(b'\n');
    Ok(buf)
}
