//! Schema-validated JSON configuration files with hot reload and
//! per-field observers.
//!
//! A [`ConfigHandle`] reads a JSON document and its sibling
//! `<stem>.schema.json` schema, keeps the payload schema-valid across
//! every mutation, persists it pretty-printed, and optionally re-reads
//! the file on debounced filesystem changes. Consumers subscribe to
//! lifecycle events or observe individual fields over time.
//!
//! ```no_run
//! use live_config::{ConfigHandle, ConfigOptions};
//!
//! # async fn example() -> live_config::Result<()> {
//! let handle = ConfigHandle::with_options(
//!     "conf/app.json",
//!     ConfigOptions::default().with_auto_reload(true),
//! )?;
//! handle.read(None).await?;
//!
//! println!("port: {:?}", handle.get("server.port")?);
//! handle.set("server.host", "0.0.0.0".into())?;
//! handle.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod fields;
pub mod handle;
pub mod observers;
pub mod paths;
pub mod schema;
mod watcher;

pub use error::{ConfigError, Result};
pub use events::ConfigEvent;
pub use handle::{ConfigHandle, ConfigOptions, DEFAULT_RELOAD_DELAY};
pub use observers::{FieldObserver, ObserverId};
pub use schema::{CompiledSchema, ValidationViolations, Violation};
