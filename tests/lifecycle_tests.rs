//! Integration tests for handle construction, the read/close lifecycle,
//! and persistence round-trips.

use live_config::{ConfigError, ConfigEvent, ConfigHandle, ConfigOptions};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

/// Unwrap a JSON literal into the payload mapping type.
fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other:?}"),
    }
}

/// Write a JSON document into the temp dir and return its path.
fn write_file(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

/// Read the config file back as parsed JSON.
fn read_file(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_rejects_unrecognized_extension() {
    for path in ["app.yaml", "app.toml", "app"] {
        let result = ConfigHandle::new(path);
        assert!(
            matches!(result, Err(ConfigError::UnsupportedExtension { .. })),
            "expected rejection for {path}"
        );
    }
}

#[test]
fn test_schema_path_derived_from_config_path() {
    let handle = ConfigHandle::new("conf/app.json").unwrap();
    assert_eq!(
        handle.schema_path(),
        std::path::Path::new("conf/app.schema.json")
    );
}

#[tokio::test]
async fn test_operations_before_read_fail() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "app.json", &json!({"foo": "bar"}));
    let handle = ConfigHandle::new(path).unwrap();

    assert!(matches!(
        handle.get("foo"),
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.set("foo", json!(1)),
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.set_payload(object(json!({"foo": "x"}))),
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.write_to_disk().await,
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.lazy_write(),
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.setup_auto_reload(),
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.observable_of("foo"),
        Err(ConfigError::NotRead { .. })
    ));
    assert!(matches!(
        handle.close().await,
        Err(ConfigError::NotRead { .. })
    ));
}

#[tokio::test]
async fn test_read_exposes_independent_payload_copy() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "app.json", &json!({"foo": "world!"}));
    let handle = ConfigHandle::new(path).unwrap();
    handle.read(None).await.unwrap();

    let mut copy = handle.payload();
    assert_eq!(Value::Object(copy.clone()), json!({"foo": "world!"}));

    // Mutating the returned copy never affects internal state.
    copy.insert("foo".to_string(), json!("tampered"));
    assert_eq!(handle.get("foo").unwrap(), Some(json!("world!")));
}

#[test]
fn test_payload_empty_before_read() {
    let handle = ConfigHandle::new("app.json").unwrap();
    assert!(handle.payload().is_empty());
    assert!(!handle.has_been_read());
}

#[tokio::test]
async fn test_missing_file_without_create_propagates() {
    let temp = TempDir::new().unwrap();
    let handle = ConfigHandle::new(temp.path().join("absent.json")).unwrap();

    let err = handle.read(None).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!handle.has_been_read());
}

#[tokio::test]
async fn test_malformed_json_propagates() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();
    let handle = ConfigHandle::new(path).unwrap();

    assert!(matches!(
        handle.read(None).await,
        Err(ConfigError::Parse { .. })
    ));
    assert!(!handle.has_been_read());
}

#[tokio::test]
async fn test_non_object_document_rejected() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "list.json", &json!([1, 2, 3]));
    let handle = ConfigHandle::new(path).unwrap();

    assert!(matches!(
        handle.read(None).await,
        Err(ConfigError::PayloadShape { actual: "array" })
    ));
}

#[tokio::test]
async fn test_create_on_missing_persists_default() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fresh.json");
    let handle = ConfigHandle::with_options(
        &path,
        ConfigOptions::default().with_create_on_missing(true),
    )
    .unwrap();
    let mut events = handle.events();

    handle.read(Some(object(json!({"foo": "bar"})))).await.unwrap();
    assert!(handle.has_been_read());
    assert_eq!(handle.get("foo").unwrap(), Some(json!("bar")));

    // The synthesized payload lands on disk via the deferred write.
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for the deferred write")
        .unwrap();
    assert_eq!(event, ConfigEvent::ConfigWritten);
    assert_eq!(read_file(&path), json!({"foo": "bar"}));
}

#[tokio::test]
async fn test_create_on_missing_without_default_uses_empty_payload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fresh.json");
    let handle = ConfigHandle::with_options(
        &path,
        ConfigOptions::default().with_create_on_missing(true),
    )
    .unwrap();
    let mut events = handle.events();

    handle.read(None).await.unwrap();
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for the deferred write")
        .unwrap();
    assert_eq!(read_file(&path), json!({}));
}

#[tokio::test]
async fn test_round_trip_set_write_read() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "app.json", &json!({"foo": "world!"}));

    let writer = ConfigHandle::new(&path).unwrap();
    writer.read(None).await.unwrap();
    writer.set("nested.value", json!(42)).unwrap();
    writer.write_to_disk().await.unwrap();

    let reader = ConfigHandle::new(&path).unwrap();
    reader.read(None).await.unwrap();
    assert_eq!(reader.get("nested.value").unwrap(), Some(json!(42)));
    assert_eq!(reader.get("foo").unwrap(), Some(json!("world!")));
}

#[tokio::test]
async fn test_close_then_read_reactivates() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "app.json", &json!({"foo": "world!"}));
    let handle = ConfigHandle::new(path).unwrap();

    handle.read(None).await.unwrap();
    handle.close().await.unwrap();
    assert!(!handle.has_been_read());
    assert!(handle.payload().is_empty());

    // Double close without an intervening read is a precondition error.
    assert!(matches!(
        handle.close().await,
        Err(ConfigError::NotRead { .. })
    ));

    // The handle is legitimately readable again.
    handle.read(None).await.unwrap();
    assert_eq!(handle.get("foo").unwrap(), Some(json!("world!")));
    handle.close().await.unwrap();
    assert!(!handle.has_been_read());
}

#[tokio::test]
async fn test_close_flushes_exactly_once() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "app.json", &json!({"foo": "world!"}));
    let handle = ConfigHandle::new(&path).unwrap();

    handle.read(None).await.unwrap();
    handle.set("foo", json!("updated")).unwrap();

    let mut events = handle.events();
    handle.close().await.unwrap();

    assert_eq!(events.try_recv().unwrap(), ConfigEvent::ConfigWritten);
    assert!(events.try_recv().is_err());
    assert_eq!(read_file(&path), json!({"foo": "updated"}));
}
