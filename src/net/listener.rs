//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Tell accept failures of a single connection from a broken listener

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to accept connection.
    Accept(std::io::Error),
    /// The connection limiter was shut down.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { address, source } => {
                write!(f, "Failed to bind {}: {}", address, source)
            }
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Connection limiter closed"),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
            ListenerError::Accept(e) => Some(e),
            ListenerError::Closed => None,
        }
    }
}

/// How the accept loop should react to a failed accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptRecovery {
    /// The failure belonged to one connection; accept the next one.
    Retry,
    /// Out of descriptors or buffers; wait before accepting again.
    Backoff,
    /// The listener cannot accept anymore.
    Fatal,
}

impl ListenerError {
    pub fn recovery(&self) -> AcceptRecovery {
        match self {
            ListenerError::Accept(e) => accept_recovery(e),
            ListenerError::Bind { .. } | ListenerError::Closed => AcceptRecovery::Fatal,
        }
    }
}

fn accept_recovery(error: &std::io::Error) -> AcceptRecovery {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionRefused
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock
        | ErrorKind::TimedOut => AcceptRecovery::Retry,
        ErrorKind::OutOfMemory => AcceptRecovery::Backoff,
        _ => error
            .raw_os_error()
            .and_then(os_recovery)
            .unwrap_or(AcceptRecovery::Fatal),
    }
}

#[cfg(unix)]
fn os_recovery(code: i32) -> Option<AcceptRecovery> {
    match code {
        libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM => Some(AcceptRecovery::Backoff),
        // Network errors of the pending connection surface on accept.
        libc::EPROTO | libc::ENETDOWN | libc::ENETUNREACH | libc::EHOSTUNREACH | libc::EPERM => {
            Some(AcceptRecovery::Retry)
        }
        _ => None,
    }
}

#[cfg(not(unix))]
fn os_recovery(_code: i32) -> Option<AcceptRecovery> {
    None
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind to the configured host and port with connection limits.
    ///
    /// An empty host binds every interface; port zero picks an ephemeral port.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", config.bind_host(), config.port);

        let listener = TcpListener::bind((config.bind_host(), config.port))
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::debug!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool,
/// even if the connection task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(port: u16, max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            host: "127.0.0.1".into(),
            port,
            max_connections,
            ..ListenerConfig::default()
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::bind(&loopback(0, 4)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(listener.available_permits(), 4);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = Listener::bind(&loopback(0, 4)).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let err = match Listener::bind(&loopback(port, 4)).await {
            Ok(_) => panic!("second bind on {} should fail", port),
            Err(e) => e,
        };
        assert!(matches!(err, ListenerError::Bind { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[test]
    fn connection_failures_are_retried() {
        use std::io::{Error, ErrorKind};

        for kind in [ErrorKind::ConnectionAborted, ErrorKind::ConnectionReset, ErrorKind::Interrupted] {
            assert_eq!(ListenerError::Accept(Error::from(kind)).recovery(), AcceptRecovery::Retry);
        }
        assert_eq!(ListenerError::Accept(Error::other("broken")).recovery(), AcceptRecovery::Fatal);
        assert_eq!(ListenerError::Closed.recovery(), AcceptRecovery::Fatal);
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_exhaustion_backs_off() {
        for code in [libc::EMFILE, libc::ENFILE] {
            let err = ListenerError::Accept(std::io::Error::from_raw_os_error(code));
            assert_eq!(err.recovery(), AcceptRecovery::Backoff);
        }
        let err = ListenerError::Accept(std::io::Error::from_raw_os_error(libc::EBADF));
        assert_eq!(err.recovery(), AcceptRecovery::Fatal);
    }

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let listener = Listener::bind(&loopback(0, 1)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 0);

        drop(permit);
        assert_eq!(listener.available_permits(), 1);
    }
}
