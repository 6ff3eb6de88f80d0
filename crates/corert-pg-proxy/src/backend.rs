use std::net::SocketAddr;
use std::sync::Arc;

use corert_errors::{Code, Error};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;

use crate::auth::authenticate_backend;
use crate::constants::{CANCEL_REQUEST_CODE, SSL_REQUEST_CODE, STARTUP_V3_CODE};
use crate::message::{encode_params, read_message, write_message, write_untagged};
use crate::peekable::PeekableStream;
use crate::tls;

/// `BackendKeyData` captured off the backend's auth-phase messages
/// (spec.md §4.13 `BACKEND_CONNECT`), keyed on later to route a
/// `CancelRequest` (spec.md seed scenario 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendKeyData {
    pub pid: i32,
    pub secret: i32,
}

/// The client-supplied identity handed to a [`BackendDialer`] once
/// `STARTUP` has parsed the parameter list (spec.md §4.13).
pub struct StartupRequest {
    pub params: Vec<(String, String)>,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
}

/// An established, authenticated connection to the backend, ready for
/// `STEADY_STATE` copying.
pub struct BackendConnection {
    pub stream: PeekableStream,
    pub key_data: Option<BackendKeyData>,
    backend_addr: SocketAddr,
}

impl BackendConnection {
    pub fn backend_addr(&self) -> SocketAddr {
        self.backend_addr
    }

    /// Routes a `CancelRequest` to this connection's backend over a
    /// brand-new socket, verbatim and without authentication (spec.md
    /// §4.13 `CANCEL`).
    pub async fn cancel(&self) -> Result<(), Error> {
        let key = self.key_data.ok_or_else(|| Error::new(Code::FailedPrecondition, "backend connection has no BackendKeyData to route a cancel request to"))?;
        send_cancel_request(self.backend_addr, key).await
    }
}

/// Opens a fresh socket to `addr` and forwards `CancelRequest` verbatim,
/// with no authentication (spec.md §4.13 `CANCEL`).
pub async fn send_cancel_request(addr: SocketAddr, key: BackendKeyData) -> Result<(), Error> {
    let tcp = TcpStream::connect(addr).await.map_err(io_err)?;
    let mut stream = PeekableStream::new(Box::pin(tcp));
    let mut body = CANCEL_REQUEST_CODE.to_be_bytes().to_vec();
    body.extend_from_slice(&key.pid.to_be_bytes());
    body.extend_from_slice(&key.secret.to_be_bytes());
    write_untagged(&mut stream, &body).await
}

/// Dials and authenticates against a single fixed backend (spec.md
/// §4.13 `BACKEND_CONNECT`). `frontend` is forwarded `ParameterStatus`/
/// `BackendKeyData`/`ReadyForQuery` as the backend sends them, and the
/// proxy's own `AuthenticationOk` once the backend auth completes.
pub struct TcpBackendDialer {
    pub addr: SocketAddr,
    pub tls: Option<(Arc<rustls::ClientConfig>, ServerName<'static>)>,
}

impl TcpBackendDialer {
    pub fn new(addr: SocketAddr) -> Self {
        TcpBackendDialer { addr, tls: None }
    }

    pub async fn dial(&self, req: &StartupRequest, frontend: &mut PeekableStream) -> Result<BackendConnection, Error> {
        let tcp = TcpStream::connect(self.addr).await.map_err(io_err)?;
        let mut backend = PeekableStream::new(Box::pin(tcp));

        if let Some((client_cfg, server_name)) = &self.tls {
            write_untagged(&mut backend, &SSL_REQUEST_CODE.to_be_bytes()).await?;
            let resp = backend.read_u8().await.map_err(io_err)?;
            match resp {
                b'S' => {
                    let upgraded = tls::connect_backend_tls(client_cfg, server_name.clone(), backend.into_inner()).await?;
                    backend = PeekableStream::new(upgraded);
                }
                b'N' => {}
                other => return Err(Error::new(Code::Unavailable, format!("backend rejected SSL negotiation with '{}'", other as char))),
            }
        }

        write_untagged(&mut backend, &encode_params(STARTUP_V3_CODE, &req.params)).await?;
        authenticate_backend(&mut backend, &req.user, req.password.as_deref()).await?;

        // spec.md §4.13: "notify client AuthenticationOk"
        write_message(frontend, b'R', &0u32.to_be_bytes()).await?;

        let mut key_data = None;
        loop {
            let msg = read_message(&mut backend).await?;
            match msg.tag {
                b'K' if msg.body.len() >= 8 => {
                    key_data = Some(BackendKeyData {
                        pid: i32::from_be_bytes(msg.body[0..4].try_into().unwrap()),
                        secret: i32::from_be_bytes(msg.body[4..8].try_into().unwrap()),
                    });
                    write_message(frontend, msg.tag, &msg.body).await?;
                }
                b'Z' => {
                    write_message(frontend, msg.tag, &msg.body).await?;
                    break;
                }
                b'E' => return Err(Error::new(Code::Unavailable, crate::auth::error_response_message(&msg.body))),
                _ => write_message(frontend, msg.tag, &msg.body).await?,
            }
        }

        Ok(BackendConnection { stream: backend, key_data, backend_addr: self.addr })
    }
}

fn io_err(err: std::io::Error) -> Error {
    Error::new(Code::Unavailable, format!("postgres backend connection I/O error: {err}"))
}
