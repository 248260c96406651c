// ABOUTME: Channel dialer that stands in for TCP dialing in the HTTP client.
// ABOUTME: Each dial opens a direct-tcpip channel to the remote loopback port.

use super::client::TunnelHandler;
use super::error::{Error, Result};
use futures::future::BoxFuture;
use hyper::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use russh::ChannelStream;
use russh::client::{Handle, Msg};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Address every channel targets, as seen from the remote host.
pub const LOOPBACK: &str = "127.0.0.1";

/// Originator reported to the server in each channel open request.
const ORIGINATOR_ADDRESS: &str = "127.0.0.1";
const ORIGINATOR_PORT: u32 = 0;

/// Opens channels to `127.0.0.1:<target_port>` on the remote host.
///
/// Clones share the transport. Channel opens over one transport are safe to run
/// concurrently, so the dialer holds no lock.
#[derive(Clone)]
pub struct ChannelDialer {
    transport: Arc<Handle<TunnelHandler>>,
    target_port: u16,
}

impl std::fmt::Debug for ChannelDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDialer")
            .field("transport", &"<russh::Handle>")
            .field("target_port", &self.target_port)
            .finish()
    }
}

impl ChannelDialer {
    pub(crate) fn new(transport: Arc<Handle<TunnelHandler>>, target_port: u16) -> Self {
        Self {
            transport,
            target_port,
        }
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    /// Open a new channel to the remote loopback target.
    pub async fn dial(&self) -> Result<TunnelStream> {
        tracing::trace!("opening channel to {}:{}", LOOPBACK, self.target_port);

        let channel = self
            .transport
            .channel_open_direct_tcpip(
                LOOPBACK,
                u32::from(self.target_port),
                ORIGINATOR_ADDRESS,
                ORIGINATOR_PORT,
            )
            .await
            .map_err(|e| Error::ChannelOpen {
                port: self.target_port,
                reason: e.to_string(),
            })?;

        Ok(TunnelStream::new(channel.into_stream()))
    }
}

/// The address the HTTP layer asks for is a placeholder and is ignored.
impl tower_service::Service<Uri> for ChannelDialer {
    type Response = TunnelStream;
    type Error = Error;
    type Future = BoxFuture<'static, Result<TunnelStream>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, requested: Uri) -> Self::Future {
        let dialer = self.clone();
        Box::pin(async move {
            tracing::trace!("dial requested for {}", requested);
            dialer.dial().await
        })
    }
}

/// Byte stream over one SSH channel, usable as an HTTP connection.
pub struct TunnelStream {
    inner: TokioIo<Pin<Box<ChannelStream<Msg>>>>,
}

impl std::fmt::Debug for TunnelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelStream").finish_non_exhaustive()
    }
}

impl TunnelStream {
    fn new(stream: ChannelStream<Msg>) -> Self {
        Self {
            inner: TokioIo::new(Box::pin(stream)),
        }
    }

    /// The underlying channel stream, for use with tokio I/O utilities.
    pub fn into_inner(self) -> Pin<Box<ChannelStream<Msg>>> {
        self.inner.into_inner()
    }
}

impl Read for TunnelStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Write for TunnelStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Connection for TunnelStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}
