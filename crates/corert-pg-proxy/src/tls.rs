use std::sync::Arc;

use corert_errors::{Code, Error};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::peekable::BoxedStream;

/// Optional TLS material for either side of the proxy (spec.md §4.13's
/// "if TLS config present" branches). Absent on either side means the
/// corresponding negotiation is declined with `'N'`.
#[derive(Clone, Default)]
pub struct TlsConfig {
    pub frontend: Option<Arc<rustls::ServerConfig>>,
    pub backend: Option<(Arc<rustls::ClientConfig>, ServerName<'static>)>,
}

/// Performs the server-side handshake after the client's `SSLRequest` was
/// accepted with `'S'` (spec.md §4.13 `PEEK_STARTUP` TLS branch).
pub async fn accept_frontend_tls<S>(config: &Arc<rustls::ServerConfig>, stream: S) -> Result<BoxedStream, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let acceptor = TlsAcceptor::from(config.clone());
    let tls = acceptor.accept(stream).await.map_err(|err| Error::new(Code::Unavailable, format!("frontend TLS handshake failed: {err}")))?;
    Ok(Box::pin(tls))
}

/// Performs the client-side handshake when connecting to a backend that
/// replied `'S'` to our `SSLRequest` (spec.md §4.13 `BACKEND_CONNECT`).
pub async fn connect_backend_tls<S>(client: &Arc<rustls::ClientConfig>, server_name: ServerName<'static>, stream: S) -> Result<BoxedStream, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let connector = TlsConnector::from(client.clone());
    let tls = connector.connect(server_name, stream).await.map_err(|err| Error::new(Code::Unavailable, format!("backend TLS handshake failed: {err}")))?;
    Ok(Box::pin(tls))
}
