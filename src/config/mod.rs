//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → sections handed to server, certificate provider and logging pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - No global lookup: each subsystem receives its section at construction

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use validation::config_warnings;
pub use schema::{
    AppConfig, HttpConfig, ListenerConfig, LoggerConfig, LoggerEncoding, RequestLogConfig,
    RequestLogEncoding, RestConfig, StorageConfig, StorageKind,
};
