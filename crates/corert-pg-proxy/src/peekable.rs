use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

/// Anything the proxy can read from and write to, boxed so the frontend
/// connection can transparently swap a plain TCP stream for a TLS stream
/// mid-connection (spec.md §4.13's SSL-negotiation loop back to
/// `PEEK_STARTUP`).
pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

pub type BoxedStream = Pin<Box<dyn IoStream>>;

/// A frontend connection wrapper supporting `UnreadByte`/`UnreadMsg`
/// (spec.md §4.13): bytes put back are served before the underlying
/// socket is read again.
pub struct PeekableStream {
    inner: BoxedStream,
    pending: VecDeque<u8>,
}

impl PeekableStream {
    pub fn new(inner: BoxedStream) -> Self {
        PeekableStream { inner, pending: VecDeque::new() }
    }

    /// Swaps the underlying transport (used after a TLS handshake
    /// completes). Any still-pending unread bytes are kept.
    pub fn replace_inner(&mut self, inner: BoxedStream) {
        self.inner = inner;
    }

    pub fn unread_byte(&mut self, byte: u8) {
        self.pending.push_front(byte);
    }

    pub fn unread_msg(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.pending.push_front(b);
        }
    }

    pub async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() && !self.pending.is_empty() {
            buf[filled] = self.pending.pop_front().unwrap();
            filled += 1;
        }
        if filled < buf.len() {
            self.inner.read_exact(&mut buf[filled..]).await?;
        }
        Ok(())
    }

    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf).await?;
        Ok(buf[0])
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes).await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    pub fn into_inner(self) -> BoxedStream {
        self.inner
    }

    pub fn inner_mut(&mut self) -> &mut BoxedStream {
        &mut self.inner
    }
}

/// Lets `tokio::io::copy` (and anything else generic over `AsyncRead`)
/// drive a `PeekableStream` directly for `STEADY_STATE` byte-shoveling,
/// still honoring any bytes put back via `unread_byte`/`unread_msg`.
impl AsyncRead for PeekableStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.pending.is_empty() {
            while buf.remaining() > 0 {
                match this.pending.pop_front() {
                    Some(b) => buf.put_slice(&[b]),
                    None => break,
                }
            }
            return Poll::Ready(Ok(()));
        }
        this.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for PeekableStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.get_mut().inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.as_mut().poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn unread_byte_is_served_before_the_socket() {
        let (client, mut server) = duplex(64);
        server.write_all(b"X").await.unwrap();
        let mut stream = PeekableStream::new(Box::pin(client));
        let mut buf = [0u8; 1];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], b'X');
        stream.unread_byte(b'X');
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], b'X');
    }

    #[tokio::test]
    async fn unread_msg_preserves_order() {
        let (client, _server) = duplex(64);
        let mut stream = PeekableStream::new(Box::pin(client));
        stream.unread_msg(b"abc");
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abc");
    }
}
