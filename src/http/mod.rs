//! HTTP layer subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (plain or TLS, HTTP/1.1 or HTTP/2)
//!     → server.rs (per-connection hyper service, peer address)
//!     → request ID assigned when absent
//!     → dispatch.rs (gRPC by content type, else HTTP router)
//!         gRPC → registered service → RPC interceptors → handler
//!         HTTP → interceptors → native route | gateway | JSON 404
//! ```
//!
//! # Design Decisions
//! - One port for both protocols; classification happens per request
//! - The request ID is assigned before classification so both sides see it

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::{is_rpc_request, Multiplexer, RpcRoutes};
pub use response::{ErrorBody, StatusResponse};
pub use server::{ListeningServer, Server, ServerError};
