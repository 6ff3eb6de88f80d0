//! Terminates a client Postgres v3 wire-protocol connection and forwards
//! it to a single fixed backend: `PEEK_STARTUP`/SSL negotiation,
//! password/MD5 `BACKEND_CONNECT` auth, `CANCEL` routing, and a
//! `STEADY_STATE` byte-shoveling phase (spec.md §4.13).

mod auth;
mod backend;
mod constants;
mod frontend;
mod listener;
mod message;
mod multiplexer;
mod peekable;
mod tls;

pub use backend::{send_cancel_request, BackendConnection, BackendKeyData, StartupRequest, TcpBackendDialer};
pub use constants::{CANCEL_REQUEST_CODE, MAX_MESSAGE_LEN, SSL_REQUEST_CODE, STARTUP_V3_CODE};
pub use frontend::{handle_connection, STEADY_STATE_GRACE};
pub use listener::{serve, ProxyOptions};
pub use message::{encode_params, parse_params, read_message, read_startup_header, write_message, write_untagged, Message, StartupHeader};
pub use multiplexer::SingleBackendMultiplexer;
pub use peekable::{BoxedStream, IoStream, PeekableStream};
pub use tls::{accept_frontend_tls, connect_backend_tls, TlsConfig};
