/// Core TCP connection handling
///
/// Binding the client-facing listener, accepting clients and dialing the
/// primary all go through `ConnectionManager`, so socket options and dial
/// timeouts are applied in one place.
use crate::core::PrimaryAddress;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// TCP connection manager for client connections and primary dialing
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    /// Connection timeout for primary connections
    dial_timeout: Duration,
}

/// Result of a connection attempt
#[derive(Debug)]
pub enum ConnectionResult {
    Success(TcpStream),
    Timeout,
    ConnectionRefused,
    NetworkError(io::Error),
}

impl ConnectionResult {
    /// Human readable failure reason, `None` on success
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            ConnectionResult::Success(_) => None,
            ConnectionResult::Timeout => Some("connect timed out".to_string()),
            ConnectionResult::ConnectionRefused => Some("connection refused".to_string()),
            ConnectionResult::NetworkError(e) => Some(e.to_string()),
        }
    }
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(dial_timeout: Duration) -> Self {
        Self { dial_timeout }
    }

    /// Create a TCP listener on the specified address
    pub async fn create_listener(&self, listen_addr: &str) -> Result<TcpListener, io::Error> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept incoming client connections
    pub async fn accept_connection(
        &self,
        listener: &TcpListener,
    ) -> Result<(TcpStream, SocketAddr), io::Error> {
        let (stream, addr) = listener.accept().await?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to configure client stream: {}", e);
        }

        debug!("Accepted connection from {}", addr);
        Ok((stream, addr))
    }

    /// Connect to the primary
    pub async fn connect_to_primary(&self, primary: &PrimaryAddress) -> ConnectionResult {
        debug!("Connecting to primary {}", primary);

        let target = (primary.host(), primary.port());
        match timeout(self.dial_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to configure primary stream: {}", e);
                }

                debug!("Successfully connected to primary {}", primary);
                ConnectionResult::Success(stream)
            }
            Ok(Err(e)) => match e.kind() {
                io::ErrorKind::ConnectionRefused => {
                    debug!("Connection refused by primary {}", primary);
                    ConnectionResult::ConnectionRefused
                }
                _ => {
                    debug!("Network error connecting to primary {}: {}", primary, e);
                    ConnectionResult::NetworkError(e)
                }
            },
            Err(_) => {
                debug!("Timeout connecting to primary {}", primary);
                ConnectionResult::Timeout
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_listener_creation() {
        let manager = ConnectionManager::default();

        // Use port 0 to get any available port
        let listener = manager.create_listener("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(addr.port() > 0);
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_accept_connection() {
        let manager = ConnectionManager::default();
        let listener = manager.create_listener("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, peer) = manager.accept_connection(&listener).await.unwrap();
        let client = client.await.unwrap();

        assert_eq!(peer, client.local_addr().unwrap());
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_primary_connection_success() {
        let server_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server_listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server_listener.accept().await;
        });

        let manager = ConnectionManager::default();
        let primary = PrimaryAddress::new("127.0.0.1", server_addr.port());
        let result = manager.connect_to_primary(&primary).await;

        assert!(matches!(result, ConnectionResult::Success(_)));
        assert!(result.failure_reason().is_none());
    }

    #[tokio::test]
    async fn test_primary_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let manager = ConnectionManager::default();
        let result = manager
            .connect_to_primary(&PrimaryAddress::new("127.0.0.1", port))
            .await;

        assert!(matches!(result, ConnectionResult::ConnectionRefused));
        assert_eq!(result.failure_reason().unwrap(), "connection refused");
    }
}
