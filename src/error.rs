//! Error taxonomy for configuration handles.
//!
//! Construction and precondition errors are synchronous and recoverable by
//! the caller. Validation errors carry every schema violation at once.
//! I/O errors from `read()` and `write_to_disk()` propagate to their direct
//! caller; background failures (deferred writes, watcher reloads) are
//! reported through the event channel instead.

use crate::schema::ValidationViolations;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors produced by a [`crate::ConfigHandle`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config path does not end in a recognized extension.
    #[error("unsupported extension for '{}': expected a .json configuration file", .path.display())]
    UnsupportedExtension {
        /// The rejected path.
        path: PathBuf,
    },

    /// An operation was attempted before the first successful `read()`.
    #[error("cannot {operation} before the first successful read()")]
    NotRead {
        /// What the caller tried to do.
        operation: &'static str,
    },

    /// The config document is valid JSON but not an object.
    #[error("configuration payload must be a JSON object, got {actual}")]
    PayloadShape {
        /// JSON type of the offending document.
        actual: &'static str,
    },

    /// The schema document could not be compiled.
    #[error("failed to compile schema: {reason}")]
    SchemaCompile {
        /// Compiler diagnostic.
        reason: String,
    },

    /// A candidate payload failed schema validation. The display enumerates
    /// every violation, one per line, so callers can present all problems
    /// at once.
    #[error("payload rejected by schema:\n{violations}")]
    Validation {
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },

    /// Filesystem error reading or writing a file.
    #[error("io error on '{}': {source}", .path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file held malformed JSON.
    #[error("invalid JSON in '{}': {source}", .path.display())]
    Parse {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The payload could not be serialized for persistence.
    #[error("failed to serialize payload: {source}")]
    Serialize {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The filesystem watcher could not be established.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for the missing-file condition the loader treats specially
    /// when `create_on_missing` is set.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}
