//! Config loading, TOML parsing, and env var override tests.
//!
//! Env overrides only touch keys no other test in this file asserts, so the
//! tests can run in parallel.

use std::env;
use std::fs;
use std::path::PathBuf;

use extfunc::{Config, WireFormat};
use tempfile::TempDir;

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("extfunc.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_config_default_http() {
    let config = Config::default();
    assert_eq!(config.http.host, "127.0.0.1");
    assert_eq!(config.http.port, 8000);
    assert!(config.http.url.is_none());
    assert_eq!(config.http.max_body_bytes, 64 * 1024 * 1024);
}

#[test]
fn test_config_default_codec() {
    let config = Config::default();
    assert!(config.codec.accelerated);
    assert_eq!(config.codec.data_version, "1.0");
}

#[test]
fn test_config_default_logging() {
    let config = Config::default();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, "text");
    assert!(config.logging.file.is_none());
}

#[test]
fn test_load_config_from_toml() {
    let (_dir, path) = write_config(
        r#"
[collocated]
socket_path = "/run/extfunc/udf.sock"
max_connections = 64

[http]
host = "0.0.0.0"
port = 9000
worker_threads = 4

[codec]
accelerated = false

[sql]
data_format = "arrow"
function_database = "analytics"
replace_existing = true

[logging]
format = "json"
"#,
    );
    let config = Config::from_file(&path).unwrap();
    assert_eq!(
        config.collocated.socket_path,
        PathBuf::from("/run/extfunc/udf.sock")
    );
    assert_eq!(config.collocated.max_connections, 64);
    assert_eq!(config.http.host, "0.0.0.0");
    assert_eq!(config.http.port, 9000);
    assert_eq!(config.http.worker_threads, 4);
    assert!(!config.codec.accelerated);
    assert_eq!(config.codec.data_version, "1.0");
    assert_eq!(config.sql.data_format, WireFormat::Arrow);
    assert_eq!(config.sql.function_database.as_deref(), Some("analytics"));
    assert!(config.sql.replace_existing);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_file(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.codec.data_version, "1.0");
    assert_eq!(config.collocated.max_connections, 32);
}

#[test]
fn test_invalid_format_name_is_error() {
    let (_dir, path) = write_config("[sql]\ndata_format = \"csv\"\n");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_env_overrides_file() {
    let (_dir, path) = write_config("[sql]\nlink = \"from_file\"\n");
    env::set_var("EXTFUNC_SQL__LINK", "from_env");
    env::set_var("EXTFUNC_COLLOCATED__SINGLE_THREAD", "true");
    let config = Config::from_file(&path).unwrap();
    env::remove_var("EXTFUNC_SQL__LINK");
    env::remove_var("EXTFUNC_COLLOCATED__SINGLE_THREAD");

    assert_eq!(config.sql.link.as_deref(), Some("from_env"));
    assert!(config.collocated.single_thread);
}
