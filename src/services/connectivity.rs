//! Network reachability checks.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Reports whether the network is usable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Returns true if there is an active network connection.
    async fn is_connected(&self) -> bool;
}

/// Checks connectivity by opening a TCP connection to a well-known address.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    address: String,
    timeout: Duration,
}

impl TcpConnectivity {
    /// Default probe address.
    pub const DEFAULT_ADDRESS: &'static str = "1.1.1.1:443";

    /// Default time allowed for the connection attempt.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a check against `address` (`host:port`).
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Connectivity for TcpConnectivity {
    async fn is_connected(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address = %self.address, error = %e, "Connectivity check failed");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address, "Connectivity check timed out");
                false
            }
        }
    }
}

/// Always reports a connection. For hosts that track connectivity themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reachable_listener_is_connected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let check = TcpConnectivity::new(address, Duration::from_secs(2));
        assert!(check.is_connected().await);
    }

    #[tokio::test]
    async fn closed_port_is_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let check = TcpConnectivity::new(address, Duration::from_secs(2));
        assert!(!check.is_connected().await);
    }

    #[tokio::test]
    async fn always_online() {
        assert!(AlwaysOnline.is_connected().await);
    }
}
