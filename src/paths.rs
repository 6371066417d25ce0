//! Config and schema file path conventions.
//!
//! A handle is constructed for a `.json` config file; the schema lives in
//! a sibling file named `<stem>.schema.json`. The derivation is uniform:
//! a stem that already ends in `.schema` gets the suffix appended like any
//! other stem, so the convention never has to be guessed.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};

/// The only recognized configuration extension.
pub const CONFIG_EXTENSION: &str = "json";

/// Suffix appended to the config file stem to locate its schema.
pub const SCHEMA_SUFFIX: &str = ".schema.json";

/// Validate that a path ends in a recognized configuration extension.
///
/// Pure path-shape check, no filesystem access.
pub fn validate_config_path(path: &Path) -> Result<()> {
    let recognized = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONFIG_EXTENSION));

    if recognized {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedExtension {
            path: path.to_path_buf(),
        })
    }
}

/// Derive the sibling schema path for a config file.
///
/// `conf/app.json` resolves to `conf/app.schema.json`.
pub fn schema_path_for(config_path: &Path) -> PathBuf {
    let stem = config_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    config_path.with_file_name(format!("{stem}{SCHEMA_SUFFIX}"))
}
