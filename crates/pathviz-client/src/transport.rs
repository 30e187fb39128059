//! UDP transport to the knowledge-base daemon.
//!
//! A thin wrapper around one connected UDP socket: bind an ephemeral local
//! endpoint, associate it with the daemon's address, move raw framed
//! datagrams in both directions. Request/response discipline lives in the
//! dispatcher; the transport only guarantees that `exchange` consumes
//! exactly one reply per request, in arrival order.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, ClientResult};

/// Default receive buffer, sized for one maximum datagram.
pub const DEFAULT_RECV_BUFFER: usize = 65536;

/// Observer for raw traffic, so a calling layer can log or display
/// datagrams as they pass. Implementations must not block.
pub trait TrafficObserver: Send + Sync {
    fn on_sent(&self, _datagram: &[u8]) {}
    fn on_received(&self, _datagram: &[u8]) {}
}

/// Observer that does nothing.
pub struct NoopObserver;

impl TrafficObserver for NoopObserver {}

/// Byte-moving seam between the dispatcher and the network.
///
/// The UDP implementation below is the real thing; tests drive the
/// dispatcher through a scripted implementation instead.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Transmits one framed datagram.
    async fn send(&mut self, frame: &[u8]) -> ClientResult<()>;

    /// Awaits the next inbound datagram.
    async fn recv(&mut self) -> ClientResult<Vec<u8>>;

    /// Discards any already-buffered inbound datagrams without blocking,
    /// returning how many were dropped. Stale replies from a timed-out
    /// round are removed this way before the next send.
    fn drain(&mut self) -> usize;
}

/// UDP transport bound to a fixed remote endpoint.
///
/// Lifecycle: built unconnected, connected once, torn down with
/// [`disconnect`](UdpTransport::disconnect). Reconnecting means building a
/// new transport.
pub struct UdpTransport {
    host: String,
    port: u16,
    recv_buffer: usize,
    observer: Arc<dyn TrafficObserver>,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    /// Creates an unconnected transport for the given daemon address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            recv_buffer: DEFAULT_RECV_BUFFER,
            observer: Arc::new(NoopObserver),
            socket: None,
        }
    }

    /// Builder: install a traffic observer.
    pub fn with_observer(mut self, observer: Arc<dyn TrafficObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Builder: set the receive buffer size.
    pub fn with_recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer = bytes;
        self
    }

    /// Binds a local ephemeral endpoint and associates it with the daemon.
    ///
    /// An empty host is a configuration error (`NoAddress`) and is rejected
    /// before any socket work.
    pub async fn connect(&mut self) -> ClientResult<()> {
        if self.host.is_empty() {
            return Err(ClientError::NoAddress);
        }

        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect((self.host.as_str(), self.port)).await?;

        debug!(
            local = %socket.local_addr()?,
            remote = %format!("{}:{}", self.host, self.port),
            "transport connected"
        );

        self.socket = Some(socket);
        Ok(())
    }

    /// True once `connect` has succeeded and `disconnect` has not run.
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Sends one request and awaits exactly one reply (echo semantics).
    pub async fn exchange(&mut self, frame: &[u8]) -> ClientResult<Vec<u8>> {
        Transport::send(self, frame).await?;
        Transport::recv(self).await
    }

    /// Closes the local socket. Disconnecting an unconnected transport is
    /// non-fatal but reported, matching the connect/disconnect pairing the
    /// caller is expected to keep.
    pub fn disconnect(&mut self) -> ClientResult<()> {
        match self.socket.take() {
            Some(socket) => {
                if let Ok(local) = socket.local_addr() {
                    debug!(local = %local, "transport disconnected");
                }
                Ok(())
            }
            None => {
                warn!("disconnect called on a transport that is not connected");
                Err(ClientError::NotConnected)
            }
        }
    }

    fn socket(&self) -> ClientResult<&UdpSocket> {
        if self.host.is_empty() {
            return Err(ClientError::NoAddress);
        }
        self.socket.as_ref().ok_or(ClientError::NotConnected)
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, frame: &[u8]) -> ClientResult<()> {
        let socket = self.socket()?;
        self.observer.on_sent(frame);
        let sent = socket.send(frame).await?;
        trace!(bytes = sent, "datagram sent");
        Ok(())
    }

    async fn recv(&mut self) -> ClientResult<Vec<u8>> {
        let socket = self.socket()?;
        let mut buf = vec![0u8; self.recv_buffer];
        let received = socket.recv(&mut buf).await?;
        buf.truncate(received);
        trace!(bytes = received, "datagram received");
        self.observer.on_received(&buf);
        Ok(buf)
    }

    fn drain(&mut self) -> usize {
        let Some(socket) = self.socket.as_ref() else {
            return 0;
        };

        let mut buf = vec![0u8; self.recv_buffer];
        let mut dropped = 0;
        while socket.try_recv(&mut buf).is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "drained stale datagrams");
        }
        dropped
    }
}
