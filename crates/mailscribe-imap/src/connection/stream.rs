//! TLS stream setup.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::Config;
use crate::{Error, Result};

/// An implicit-TLS connection to an IMAP server.
pub type ImapStream = TlsStream<TcpStream>;

/// Creates a TLS connector with the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Connects to the configured server with TLS from the start.
///
/// TCP connect and the TLS handshake together are bounded by
/// [`Config::connect_timeout`].
///
/// # Errors
///
/// Returns an error if the host is unreachable, the name is not a valid
/// DNS name, the handshake fails, or the timeout elapses.
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let handshake = async {
        let addr = format!("{}:{}", config.host, config.port);
        debug!(%addr, "connecting");
        let tcp = TcpStream::connect(&addr).await?;

        let server_name = ServerName::try_from(config.host.clone())?;
        let tls = create_tls_connector().connect(server_name, tcp).await?;
        Ok::<_, Error>(tls)
    };

    tokio::time::timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 on loopback is closed on any sane test host.
        let config = Config::new("127.0.0.1")
            .with_port(1)
            .with_connect_timeout(Duration::from_secs(5));
        let result = connect(&config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_dns_name() {
        let config = Config::new("not a host name").with_connect_timeout(Duration::from_secs(5));
        assert!(connect(&config).await.is_err());
    }
}
