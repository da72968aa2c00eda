//! Backend dialing with a deadline.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

/// Any bidirectional byte stream to a backend.
pub trait BackendIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> BackendIo for T {}

pub type BackendStream = Box<dyn BackendIo>;

/// TLS parameters for one dial.
#[derive(Clone)]
pub struct TlsTarget {
    pub config: Arc<ClientConfig>,
    pub server_name: ServerName<'static>,
}

#[derive(Debug, Error)]
pub enum DialError {
    #[error("dial {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("dial {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("tls handshake with {addr}: {source}")]
    Tls {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Connect to `addr`, optionally wrapping the stream in TLS. The deadline covers both steps.
pub async fn dial(addr: &str, deadline: Duration, tls: Option<TlsTarget>) -> Result<BackendStream, DialError> {
    let attempt = async {
        let tcp = TcpStream::connect(addr).await.map_err(|source| DialError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        let _ = tcp.set_nodelay(true);

        match tls {
            Some(target) => {
                let stream = TlsConnector::from(target.config)
                    .connect(target.server_name, tcp)
                    .await
                    .map_err(|source| DialError::Tls {
                        addr: addr.to_string(),
                        source,
                    })?;
                Ok(Box::new(stream) as BackendStream)
            }
            None => Ok(Box::new(tcp) as BackendStream),
        }
    };

    match timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(DialError::Timeout {
            addr: addr.to_string(),
            timeout: deadline,
        }),
    }
}
