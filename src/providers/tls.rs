//! Shared TCP and TLS plumbing for mail sessions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use super::{ProviderError, Result};
use crate::domain::Endpoint;

/// Returns a TLS connector trusting the webpki root set.
///
/// The ring provider is selected explicitly since more than one rustls
/// crypto backend may be compiled in.
pub(crate) fn connector() -> Result<TlsConnector> {
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ProviderError::Connection(format!("TLS setup failed: {}", e)))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens a TCP connection to `endpoint`.
pub(crate) async fn connect_tcp(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    let address = endpoint.address();
    timed(timeout, "TCP connect", async {
        TcpStream::connect(&address)
            .await
            .map_err(|e| ProviderError::Connection(format!("TCP connect to {} failed: {}", address, e)))
    })
    .await
}

/// Performs a TLS handshake over an established TCP stream.
pub(crate) async fn upgrade(
    stream: TcpStream,
    host: &str,
    timeout: Duration,
) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ProviderError::Connection(format!("invalid server name: {}", e)))?;

    let connector = connector()?;
    timed(timeout, "TLS handshake", async {
        connector
            .connect(server_name, stream)
            .await
            .map_err(|e| ProviderError::Connection(format!("TLS handshake failed: {}", e)))
    })
    .await
}

/// Runs `future`, failing with [`ProviderError::Timeout`] after `timeout`.
pub(crate) async fn timed<T>(
    timeout: Duration,
    step: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| ProviderError::Timeout(format!("{} after {:?}", step, timeout)))?
}
