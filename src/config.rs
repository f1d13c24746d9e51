//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - extfunc.toml (default configuration)
//! - extfunc.local.toml (git-ignored local overrides)
//! - Environment variables (EXTFUNC_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # extfunc.toml
//! [collocated]
//! socket_path = "/run/extfunc/udf.sock"
//! max_connections = 64
//!
//! [http]
//! host = "0.0.0.0"
//! port = 9000
//! worker_threads = 4
//!
//! [sql]
//! data_format = "json"
//! function_database = "analytics"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! EXTFUNC_HTTP__PORT=9100
//! EXTFUNC_CODEC__ACCELERATED=false
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codec::WireFormat;
use crate::sql::{AppMode, SqlOptions};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collocated: CollocatedConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Unix-socket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollocatedConfig {
    /// Socket path; a stale file at this path is removed before binding
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Listen backlog
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Serve one connection at a time
    #[serde(default)]
    pub single_thread: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP server bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// URL advertised in CREATE FUNCTION statements (default: reflected
    /// from the request's Host header)
    #[serde(default)]
    pub url: Option<String>,

    /// Invocation worker threads. 0 = run invocations inline.
    #[serde(default)]
    pub worker_threads: usize,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Use the accelerated rowdat_1 path instead of the reference path
    #[serde(default = "default_true")]
    pub accelerated: bool,

    /// Data version used when a request does not name one
    #[serde(default = "default_data_version")]
    pub data_version: String,
}

/// CREATE FUNCTION rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlConfig {
    /// Wire format named in the FORMAT clause
    #[serde(default)]
    pub data_format: WireFormat,

    /// Database prefix for function names
    #[serde(default)]
    pub function_database: Option<String>,

    /// Emit CREATE OR REPLACE
    #[serde(default)]
    pub replace_existing: bool,

    /// LINK clause
    #[serde(default)]
    pub link: Option<String>,
}

impl SqlConfig {
    /// Statement options for a service reachable at `url`.
    pub fn options(&self, url: impl Into<String>, app_mode: AppMode) -> SqlOptions {
        SqlOptions {
            url: url.into(),
            app_mode,
            format: self.data_format,
            database: self.function_database.clone(),
            replace: self.replace_existing,
            link: self.link.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Suppress per-call `function_call_metrics` events
    #[serde(default)]
    pub disable_metrics: bool,
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(uuid::Uuid::new_v4().simple().to_string())
}
fn default_max_connections() -> usize {
    32
}
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    8000
}
fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_true() -> bool {
    true
}
fn default_data_version() -> String {
    crate::codec::DATA_VERSION.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. extfunc.toml (base configuration)
    /// 2. extfunc.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (EXTFUNC_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("extfunc.toml"))
            .merge(Toml::file("extfunc.local.toml"))
            .merge(Env::prefixed("EXTFUNC_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("EXTFUNC_").split("__"))
            .extract()
    }
}

impl Default for CollocatedConfig {
    fn default() -> Self {
        CollocatedConfig {
            socket_path: default_socket_path(),
            max_connections: default_max_connections(),
            single_thread: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            url: None,
            worker_threads: 0,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            accelerated: true,
            data_version: default_data_version(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            disable_metrics: false,
        }
    }
}
