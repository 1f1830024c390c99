//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (optional TLS handshake, ALPN h2 / http/1.1)
//!     → connection.rs (identity, active count)
//!     → Hand off to the multiplexer in the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - TLS material is produced once at listen time and never mutated
//! - The same certificate yields the trust anchor for the internal gateway client

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{AcceptRecovery, ConnectionPermit, Listener, ListenerError};
pub use tls::{Certificate, TlsError, TrustAnchor};
