use std::time::Duration;

use corert_errors::{Code, Error};

use crate::backend::{StartupRequest, TcpBackendDialer};
use crate::constants::{CANCEL_REQUEST_CODE, SSL_REQUEST_CODE, STARTUP_V3_CODE};
use crate::message::{parse_params, read_startup_header, write_message};
use crate::multiplexer::SingleBackendMultiplexer;
use crate::peekable::{BoxedStream, PeekableStream};
use crate::tls::{accept_frontend_tls, TlsConfig};

/// Grace period after the first copier direction closes before the
/// `STEADY_STATE` pair is torn down (spec.md §4.13).
pub const STEADY_STATE_GRACE: Duration = Duration::from_secs(1);

/// Drives one client connection through `PEEK_STARTUP` → `STARTUP` →
/// `BACKEND_CONNECT`/`CANCEL` → `STEADY_STATE` (spec.md §4.13). Returns
/// once the connection is fully torn down.
pub async fn handle_connection(
    stream: BoxedStream,
    tls: &TlsConfig,
    require_password: bool,
    password: Option<&str>,
    dialer: &TcpBackendDialer,
    multiplexer: &SingleBackendMultiplexer,
) -> Result<(), Error> {
    let mut frontend = PeekableStream::new(stream);

    loop {
        let header = read_startup_header(&mut frontend).await?;
        match header.code {
            SSL_REQUEST_CODE => {
                match &tls.frontend {
                    Some(server_config) => {
                        frontend.write_all(b"S").await.map_err(io_err)?;
                        let upgraded = accept_frontend_tls(server_config, frontend.into_inner()).await?;
                        frontend = PeekableStream::new(upgraded);
                    }
                    None => {
                        frontend.write_all(b"N").await.map_err(io_err)?;
                    }
                }
                continue;
            }
            CANCEL_REQUEST_CODE => {
                let mut body = vec![0u8; (header.len as usize).saturating_sub(8)];
                frontend.read_exact(&mut body).await.map_err(io_err)?;
                multiplexer.route_cancel().await?;
                return Ok(());
            }
            STARTUP_V3_CODE => {
                let mut body = vec![0u8; (header.len as usize).saturating_sub(8)];
                frontend.read_exact(&mut body).await.map_err(io_err)?;
                let params = parse_params(&body)?;
                let database = params
                    .iter()
                    .find(|(k, _)| k == "database")
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Error::new(Code::InvalidArgument, "startup message is missing the required 'database' parameter"))?;
                let user = params.iter().find(|(k, _)| k == "user").map(|(_, v)| v.clone()).unwrap_or_default();

                let password = if require_password {
                    write_message(&mut frontend, b'R', &3u32.to_be_bytes()).await?;
                    let msg = crate::message::read_message(&mut frontend).await?;
                    if msg.tag != b'p' {
                        return Err(Error::new(Code::InvalidArgument, "expected a PasswordMessage after AuthenticationCleartextPassword"));
                    }
                    let pw = String::from_utf8_lossy(msg.body.strip_suffix(&[0]).unwrap_or(&msg.body)).into_owned();
                    Some(pw)
                } else {
                    password.map(|p| p.to_string())
                };

                multiplexer.try_claim()?;
                let req = StartupRequest { params, user, database, password };
                let backend_result = dialer.dial(&req, &mut frontend).await;
                let backend = match backend_result {
                    Ok(b) => b,
                    Err(err) => {
                        multiplexer.release();
                        return Err(err);
                    }
                };
                multiplexer.record(&backend);
                let mut backend_stream = backend.stream;
                let result = steady_state_copy(&mut frontend, &mut backend_stream).await;
                multiplexer.release();
                return result;
            }
            other => return Err(Error::new(Code::InvalidArgument, format!("unsupported startup request code {other}"))),
        }
    }
}

/// Two concurrent copiers until either side closes or errors, with a
/// grace period for the other direction to finish on its own (spec.md
/// §4.13 `STEADY_STATE`).
async fn steady_state_copy(frontend: &mut PeekableStream, backend: &mut PeekableStream) -> Result<(), Error> {
    let (mut f_read, mut f_write) = tokio::io::split(&mut *frontend);
    let (mut b_read, mut b_write) = tokio::io::split(&mut *backend);

    let client_to_backend = tokio::io::copy(&mut f_read, &mut b_write);
    let backend_to_client = tokio::io::copy(&mut b_read, &mut f_write);

    tokio::pin!(client_to_backend);
    tokio::pin!(backend_to_client);

    tokio::select! {
        res = &mut client_to_backend => {
            finish_with_grace(res, backend_to_client).await
        }
        res = &mut backend_to_client => {
            finish_with_grace(res, client_to_backend).await
        }
    }
}

async fn finish_with_grace<F>(first: std::io::Result<u64>, second: F) -> Result<(), Error>
where
    F: std::future::Future<Output = std::io::Result<u64>>,
{
    if let Err(err) = first {
        tracing::debug!(%err, "steady-state copier closed with an error");
    }
    let _ = tokio::time::timeout(STEADY_STATE_GRACE, second).await;
    Ok(())
}

fn io_err(err: std::io::Error) -> Error {
    Error::new(Code::Unavailable, format!("postgres connection I/O error: {err}"))
}
