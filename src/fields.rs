//! Dotted-path access into JSON trees.
//!
//! Field paths address nested values with `.` separators (`"server.port"`).
//! Lookup translates the dotted form to a JSON Pointer and delegates to
//! serde_json; assignment walks the tree and creates intermediate objects
//! as needed.

use serde_json::{Map, Value};

/// Translate a dotted field path into a JSON Pointer.
///
/// Pointer tokens escape `~` as `~0` and `/` as `~1` per RFC 6901, so keys
/// containing those characters still resolve.
pub fn to_pointer(field_path: &str) -> String {
    let mut pointer = String::with_capacity(field_path.len() + 4);
    for segment in field_path.split('.') {
        pointer.push('/');
        for ch in segment.chars() {
            match ch {
                '~' => pointer.push_str("~0"),
                '/' => pointer.push_str("~1"),
                _ => pointer.push(ch),
            }
        }
    }
    pointer
}

/// Resolve a dotted path against a payload mapping.
///
/// Returns `None` when any segment is missing; a missing leaf is not an
/// error. Numeric segments index into arrays, per JSON Pointer rules.
pub fn lookup<'a>(payload: &'a Map<String, Value>, field_path: &str) -> Option<&'a Value> {
    let (head, rest) = match field_path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (field_path, None),
    };
    let node = payload.get(head)?;
    match rest {
        None => Some(node),
        Some(rest) => node.pointer(&to_pointer(rest)),
    }
}

/// Set the value at a dotted path, creating intermediate objects.
///
/// A non-object intermediate is replaced by an object so the assignment
/// always lands.
pub fn assign(payload: &mut Map<String, Value>, field_path: &str, value: Value) {
    let (head, rest) = match field_path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (field_path, None),
    };
    match rest {
        None => {
            payload.insert(head.to_string(), value);
        }
        Some(rest) => {
            let entry = payload
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(map) = entry {
                assign(map, rest, value);
            }
        }
    }
}

/// Human-readable JSON type name, used in shape errors.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
