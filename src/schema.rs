//! Compiled JSON Schema gatekeeping payload commits.
//!
//! The handle recompiles its schema on every `read()`, so schema-file
//! edits take effect on reload. Validation collects every violation with
//! its instance location; the resulting error message lists all problems
//! at once rather than stopping at the first.

use crate::error::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Schema applied when no schema file exists and no default was supplied
/// at construction. Accepts any JSON object.
pub fn permissive_schema() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("title".to_string(), Value::String("CONFIG".to_string()));
    map.insert("additionalProperties".to_string(), Value::Bool(true));
    map
}

/// A single schema violation with the offending instance location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the violating field (empty for the document root).
    pub instance_path: String,
    /// Human-readable reason.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations, one per offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl From<Vec<Violation>> for ValidationViolations {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Validator compiled from a JSON Schema document.
///
/// `Send + Sync`; a compiled validator is immutable and replaced wholesale
/// when the schema is re-read.
pub struct CompiledSchema {
    validator: jsonschema::Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile a schema document. The draft is taken from `$schema` when
    /// present, defaulting to the latest supported draft.
    pub fn compile(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema).map_err(|e| {
            ConfigError::SchemaCompile {
                reason: e.to_string(),
            }
        })?;
        Ok(Self { validator })
    }

    /// Check an instance against the schema, collecting every violation.
    pub fn check(&self, instance: &Value) -> Result<()> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                violations: violations.into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permissive_schema_accepts_any_object() {
        let schema = CompiledSchema::compile(&Value::Object(permissive_schema())).unwrap();
        assert!(schema.check(&json!({})).is_ok());
        assert!(
            schema
                .check(&json!({"anything": {"goes": [1, "two", null]}}))
                .is_ok()
        );
    }

    #[test]
    fn test_check_collects_all_violations() {
        let schema = CompiledSchema::compile(&json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "port": {"type": "integer"}
            },
            "required": ["name", "port"]
        }))
        .unwrap();

        let err = schema
            .check(&json!({"name": 42, "port": "eighty"}))
            .unwrap_err();
        let ConfigError::Validation { violations } = err else {
            panic!("expected a validation error");
        };
        assert_eq!(violations.len(), 2);
        let rendered = violations.to_string();
        assert!(rendered.contains("/name"));
        assert!(rendered.contains("/port"));
    }

    #[test]
    fn test_violation_display_marks_root() {
        let violation = Violation {
            instance_path: String::new(),
            message: "is not of type \"object\"".to_string(),
        };
        assert!(violation.to_string().starts_with("  (root):"));
    }

    #[test]
    fn test_invalid_schema_fails_compile() {
        let result = CompiledSchema::compile(&json!({"type": "no-such-type"}));
        assert!(matches!(result, Err(ConfigError::SchemaCompile { .. })));
    }
}
