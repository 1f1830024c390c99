//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API server.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a missing file still yields a runnable server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Process logger settings.
    pub logger: LoggerConfig,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// HTTP surface limits.
    pub http: HttpConfig,

    /// Per-request logging pipeline.
    pub request_log: RequestLogConfig,

    /// JSON marshaling used by the REST gateway.
    pub rest: RestConfig,

    /// Resource store backend.
    pub storage: StorageConfig,
}

/// Output format of the process logger.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggerEncoding {
    /// Human readable lines.
    #[default]
    Console,
    /// One JSON object per line.
    Json,
}

/// Process logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub level: String,

    /// Line format.
    pub encoding: LoggerEncoding,

    /// ANSI colors for the console format.
    pub color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            encoding: LoggerEncoding::Console,
            color: true,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind. Empty binds every interface.
    pub host: String,

    /// Port to bind. Zero picks an ephemeral port.
    pub port: u16,

    /// Serve TLS on the listener.
    pub tls: bool,

    /// Generate a self-signed development certificate instead of loading files.
    pub devcert: bool,

    /// Path to certificate file (PEM).
    pub certfile: PathBuf,

    /// Path to private key file (PEM).
    pub keyfile: PathBuf,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8900,
            tls: false,
            devcert: false,
            certfile: PathBuf::from("server.crt"),
            keyfile: PathBuf::from("server.key"),
            max_connections: 10_000,
        }
    }
}

impl ListenerConfig {
    /// Host to hand to the socket layer; an empty host means all interfaces.
    pub fn bind_host(&self) -> &str {
        if self.host.is_empty() {
            "0.0.0.0"
        } else {
            &self.host
        }
    }
}

/// Limits applied to the HTTP router (not to gRPC traffic).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Field shape of request log records.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum RequestLogEncoding {
    /// Flat key/value fields.
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Nested `httpRequest` payload in the common cloud logging layout.
    #[serde(rename = "structured-cloud", alias = "stackdriver")]
    StructuredCloud,
}

/// Request logging pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Log every request at all.
    pub enabled: bool,

    /// Record layout.
    pub encoding: RequestLogEncoding,

    /// Include request and response payloads in records.
    pub log_request_body: bool,

    /// HTTP paths that are never logged.
    pub disabled_http: Vec<String>,

    /// Unary gRPC full method names (`/pkg.Service/Method`) that are never logged.
    pub disabled_grpc: Vec<String>,

    /// Streaming gRPC full method names that are never logged.
    pub disabled_grpc_stream: Vec<String>,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            encoding: RequestLogEncoding::Default,
            log_request_body: false,
            disabled_http: Vec::new(),
            disabled_grpc: Vec::new(),
            disabled_grpc_stream: Vec::new(),
        }
    }
}

/// Gateway JSON marshaling options.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RestConfig {
    /// Render enum fields as numbers instead of names.
    pub enums_as_ints: bool,

    /// Render fields that hold their default value.
    pub emit_defaults: bool,

    /// Use the proto field names (snake_case) instead of lowerCamelCase.
    pub orig_names: bool,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            enums_as_ints: false,
            emit_defaults: true,
            orig_names: true,
        }
    }
}

/// Available store backends.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process-local map, lost on exit.
    #[default]
    Memory,
    /// PostgreSQL through sqlx.
    Postgres,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(rename = "type")]
    pub kind: StorageKind,

    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,

    /// libpq style sslmode (disable, prefer, require).
    pub sslmode: String,

    /// Connection attempts before giving up.
    pub retries: u32,

    /// Delay between connection attempts in seconds.
    pub sleep_between_retries_secs: u64,

    /// Pool size.
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            username: "postgres".to_string(),
            password: "password".to_string(),
            host: "postgres".to_string(),
            port: 5432,
            database: "thingapi".to_string(),
            sslmode: "disable".to_string(),
            retries: 5,
            sleep_between_retries_secs: 7,
            max_connections: 80,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.listener.port, 8900);
        assert!(!config.listener.tls);
        assert_eq!(config.listener.certfile, PathBuf::from("server.crt"));
        assert!(config.request_log.enabled);
        assert_eq!(config.request_log.encoding, RequestLogEncoding::Default);
        assert!(config.rest.emit_defaults);
        assert!(config.rest.orig_names);
        assert!(!config.rest.enums_as_ints);
        assert_eq!(config.storage.kind, StorageKind::Memory);
    }

    #[test]
    fn empty_host_binds_everything() {
        let mut listener = ListenerConfig::default();
        assert_eq!(listener.bind_host(), "0.0.0.0");
        listener.host = "127.0.0.1".into();
        assert_eq!(listener.bind_host(), "127.0.0.1");
    }

    #[test]
    fn encoding_names() {
        let config: RequestLogConfig = toml::from_str(r#"encoding = "structured-cloud""#).unwrap();
        assert_eq!(config.encoding, RequestLogEncoding::StructuredCloud);

        let config: RequestLogConfig = toml::from_str(r#"encoding = "stackdriver""#).unwrap();
        assert_eq!(config.encoding, RequestLogEncoding::StructuredCloud);
    }
}
