//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use crate::schema::{LogLevel, RinglineConfig};
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_ringline_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, ringline_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[relay]
port = 9000

[client]
identity = "+100"
display_name = "Alice"

[call]
ring_timeout_secs = 30

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.relay.port, 9000);
    assert_eq!(config.client.identity, "+100");
    assert_eq!(config.client.display_name, "Alice");
    assert_eq!(config.call.ring_timeout_secs, 30);
    assert_eq!(config.logging.level, LogLevel::Debug);
    // Defaults preserved
    assert_eq!(config.relay.bind, "0.0.0.0");
    assert_eq!(config.media.credential_attempts, 4);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ringline_common::ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_is_returned_as_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[call]\nring_timeout_secs = 1\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.call.ring_timeout_secs, 1);
}

#[test]
fn created_default_config_parses_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    let defaults = RinglineConfig::default();
    assert_eq!(config.relay.port, defaults.relay.port);
    assert_eq!(config.call.ring_timeout_secs, 45);
    assert_eq!(config.client.relay_url, defaults.client.relay_url);
}

#[test]
fn default_config_path_ends_with_ringline() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("ringline/config.toml"));
    }
}
