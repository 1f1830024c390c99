//! Thing API: gRPC and REST on one port.
//!
//! ```text
//! listener ─→ TLS (optional) ─→ multiplexer ─┬─→ gRPC services ─→ store
//!                                             └─→ HTTP router ─→ native routes
//!                                                             └─→ gateway ─→ loopback gRPC
//! ```

pub mod config;
pub mod gateway;
pub mod http;
pub mod interceptor;
pub mod net;
pub mod observability;
pub mod proto;
pub mod rpc;
pub mod store;

pub use config::AppConfig;
pub use self::http::{ListeningServer, Server, ServerError};
pub use interceptor::InterceptorChain;
pub use observability::LoggingPipeline;
