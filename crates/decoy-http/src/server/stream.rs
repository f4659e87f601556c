//! Connection wrapper that lets an action take over the socket.
//!
//! ERROR actions must either close without a response or write exact bytes
//! that are not a valid HTTP message. hyper owns the connection, so the
//! handler marks the connection and the next write hyper attempts is replaced.

use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

#[derive(Debug, Default)]
enum Takeover {
    #[default]
    None,
    Drop,
    Raw {
        bytes: Vec<u8>,
        written: usize,
    },
    Done,
}

/// Shared between a connection's stream and its request handler.
#[derive(Debug, Default)]
pub struct ConnectionControl {
    takeover: Mutex<Takeover>,
}

impl ConnectionControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Close the connection instead of writing the next response.
    pub fn drop_connection(&self) {
        *self.takeover.lock() = Takeover::Drop;
    }

    /// Write `bytes` instead of the next response, then close.
    pub fn write_raw(&self, bytes: Vec<u8>) {
        *self.takeover.lock() = Takeover::Raw { bytes, written: 0 };
    }

    pub fn is_taken_over(&self) -> bool {
        !matches!(*self.takeover.lock(), Takeover::None)
    }
}

fn closed_by_action() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed by action")
}

pub struct ControlledStream {
    inner: TcpStream,
    control: Arc<ConnectionControl>,
}

impl ControlledStream {
    pub fn new(inner: TcpStream, control: Arc<ConnectionControl>) -> Self {
        Self { inner, control }
    }
}

impl AsyncRead for ControlledStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ControlledStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut takeover = this.control.takeover.lock();
        if matches!(*takeover, Takeover::None) {
            drop(takeover);
            return Pin::new(&mut this.inner).poll_write(cx, buf);
        }
        match &mut *takeover {
            Takeover::None | Takeover::Drop | Takeover::Done => {
                Poll::Ready(Err(closed_by_action()))
            }
            Takeover::Raw { bytes, written } => {
                while *written < bytes.len() {
                    match Pin::new(&mut this.inner).poll_write(cx, &bytes[*written..]) {
                        Poll::Ready(Ok(0)) => {
                            return Poll::Ready(Err(io::ErrorKind::WriteZero.into()))
                        }
                        Poll::Ready(Ok(n)) => *written += n,
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                *takeover = Takeover::Done;
                Poll::Ready(Err(closed_by_action()))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
