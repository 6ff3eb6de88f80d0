use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::backend::TcpBackendDialer;
use crate::frontend::handle_connection;
use crate::multiplexer::SingleBackendMultiplexer;
use crate::tls::TlsConfig;

const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Everything a single listener needs to drive accepted connections
/// through `handle_connection` (spec.md §4.13).
pub struct ProxyOptions {
    pub tls: TlsConfig,
    pub require_password: bool,
    pub password: Option<String>,
    pub dialer: TcpBackendDialer,
}

/// Accepts connections on `listener` until the socket itself fails.
/// Temporary accept errors back off exponentially, capped at one second
/// (spec.md §4.13: "Accept-loop temporary errors use exponential backoff
/// capped at 1 second"). One [`SingleBackendMultiplexer`] is shared across
/// every accepted connection, enforcing the single-backend rule.
pub async fn serve(listener: TcpListener, options: Arc<ProxyOptions>) {
    let multiplexer = Arc::new(SingleBackendMultiplexer::new());
    let mut backoff = Duration::from_millis(10);

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                backoff = Duration::from_millis(10);
                tracing::debug!(%peer, "accepted postgres proxy connection");
                let options = options.clone();
                let multiplexer = multiplexer.clone();
                tokio::spawn(async move {
                    let stream: crate::peekable::BoxedStream = Box::pin(socket);
                    let result = handle_connection(
                        stream,
                        &options.tls,
                        options.require_password,
                        options.password.as_deref(),
                        &options.dialer,
                        &multiplexer,
                    )
                    .await;
                    if let Err(err) = result {
                        tracing::warn!(%err, %peer, "postgres proxy connection ended with an error");
                    }
                });
            }
            Err(err) => {
                tracing::warn!(%err, backoff_ms = backoff.as_millis() as u64, "temporary accept error on postgres proxy listener");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_ACCEPT_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[tokio::test]
    async fn serve_accepts_and_spawns_a_handler_per_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dialer = TcpBackendDialer::new("127.0.0.1:1".parse::<SocketAddr>().unwrap());
        let options = Arc::new(ProxyOptions {
            tls: TlsConfig::default(),
            require_password: false,
            password: None,
            dialer,
        });

        tokio::spawn(serve(listener, options));

        // A connect that never speaks the protocol should not hang the
        // server loop or this test; dropping it is enough to exercise
        // accept() succeeding and a handler being spawned.
        let _ = tokio::net::TcpStream::connect(addr).await.unwrap();
    }
}
