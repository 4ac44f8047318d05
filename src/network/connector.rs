//! Target dialing and the per-scan connection
//!
//! A `Connection` is exclusively owned by one scan. It carries the scan's
//! monotonic deadline and a read buffer sized to the probe's maximum frame,
//! and it is closed exactly once no matter how the scan ends.

use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, trace};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

use super::tls::{self, TlsInfo};
use crate::error::{is_peer_disconnect, ScanError, ScanPhase};
use crate::target::ScanTarget;

/// Upper bound on a graceful shutdown before the socket is simply dropped
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Any bidirectional byte stream a connection can wrap
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// An open transport to one target
pub struct Connection {
    stream: Option<Box<dyn Stream>>,
    deadline: Instant,
    buffer: BytesMut,
    capacity: usize,
    received: usize,
    tls: Option<TlsInfo>,
}

impl Connection {
    /// Wrap `stream`, allocating a read buffer of `max_frame_size` bytes
    pub fn new<S: Stream + 'static>(stream: S, deadline: Instant, max_frame_size: usize) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            deadline,
            buffer: BytesMut::with_capacity(max_frame_size),
            capacity: max_frame_size,
            received: 0,
            tls: None,
        }
    }

    pub fn with_tls_info(mut self, info: TlsInfo) -> Self {
        self.tls = Some(info);
        self
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes received over the life of the connection
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn tls_info(&self) -> Option<&TlsInfo> {
        self.tls.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub(crate) fn io(&mut self) -> crate::Result<(&mut Box<dyn Stream>, &mut BytesMut)> {
        match self.stream.as_mut() {
            Some(stream) => Ok((stream, &mut self.buffer)),
            None => Err(ScanError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ))),
        }
    }

    pub(crate) fn record_received(&mut self, n: usize) {
        self.received += n;
    }

    /// Write the whole payload before the scan deadline
    pub async fn write_all(&mut self, payload: &[u8]) -> crate::Result<()> {
        let started = Instant::now();
        let deadline = self.deadline;
        let received = self.received;
        let (stream, _) = self.io()?;

        let write = async {
            stream.write_all(payload).await?;
            stream.flush().await
        };

        match timeout_at(deadline, write).await {
            Ok(Ok(())) => {
                trace!("Wrote {} bytes", payload.len());
                Ok(())
            }
            Ok(Err(e)) if received == 0 && (is_peer_disconnect(&e) || e.kind() == io::ErrorKind::BrokenPipe) => {
                Err(ScanError::ConnectionClosed)
            }
            Ok(Err(e)) => Err(ScanError::Io(e)),
            Err(_) => Err(ScanError::timeout(ScanPhase::Write, started)),
        }
    }

    /// Shut the transport down. Returns false if it was already closed.
    pub async fn close(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                if let Ok(Err(e)) = timeout(CLOSE_GRACE, stream.shutdown()).await {
                    trace!("Shutdown error ignored: {}", e);
                }
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.stream.is_some())
            .field("capacity", &self.capacity)
            .field("received", &self.received)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Establishes connections to scan targets
#[async_trait]
pub trait Connect: Send + Sync {
    /// Open a connection to `target` that must be usable before `deadline`
    async fn connect(
        &self,
        target: &ScanTarget,
        deadline: Instant,
        max_frame_size: usize,
    ) -> crate::Result<Connection>;
}

/// Plain TCP or TLS-wrapped dialer. Never retries.
#[derive(Debug, Clone)]
pub struct TargetConnector {
    connect_timeout: Duration,
}

impl Default for TargetConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TargetConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn dial_timeout(&self, addr: std::net::SocketAddr, what: &str) -> ScanError {
        ScanError::Dial {
            addr,
            source: io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} timed out after {:?}", what, self.connect_timeout),
            ),
        }
    }
}

#[async_trait]
impl Connect for TargetConnector {
    async fn connect(
        &self,
        target: &ScanTarget,
        deadline: Instant,
        max_frame_size: usize,
    ) -> crate::Result<Connection> {
        let addr = target.socket_addr();

        if let Some(proxy) = &target.proxy {
            return Err(ScanError::Dial {
                addr,
                source: io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("proxy traversal via {} is not supported", proxy.address),
                ),
            });
        }

        let started = Instant::now();
        // The connect timeout never outlives the scan budget
        let dial_deadline = deadline.min(started + self.connect_timeout);
        debug!("Dialing {} (tls: {})", addr, target.tls);

        let tcp = match timeout_at(dial_deadline, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ScanError::Dial { addr, source: e }),
            Err(_) if dial_deadline < deadline => return Err(self.dial_timeout(addr, "connect")),
            Err(_) => return Err(ScanError::timeout(ScanPhase::Connect, started)),
        };

        if let Err(e) = tcp.set_nodelay(true) {
            trace!("TCP_NODELAY not set on {}: {}", addr, e);
        }

        if !target.tls {
            return Ok(Connection::new(tcp, deadline, max_frame_size));
        }

        let handshake_started = Instant::now();
        match timeout_at(dial_deadline, tls::handshake(tcp, target)).await {
            Ok(Ok((stream, info))) => {
                debug!("TLS established with {}: {} {}", addr, info.version, info.cipher);
                Ok(Connection::new(stream, deadline, max_frame_size).with_tls_info(info))
            }
            Ok(Err(e)) => Err(e),
            Err(_) if dial_deadline < deadline => Err(self.dial_timeout(addr, "tls handshake")),
            Err(_) => Err(ScanError::timeout(ScanPhase::TlsHandshake, handshake_started)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ProxyDescriptor;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_connect_plain_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            socket.read(&mut buf).await.unwrap()
        });

        let connector = TargetConnector::new(Duration::from_secs(1));
        let mut conn = connector
            .connect(&ScanTarget::from(addr), far_deadline(), 512)
            .await
            .unwrap();

        assert_eq!(conn.capacity(), 512);
        assert!(conn.tls_info().is_none());
        assert!(conn.close().await);
        assert!(!conn.close().await);
        assert!(conn.is_closed());

        // Server sees EOF once the client closes
        assert_eq!(server.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_refused_is_dial_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = TargetConnector::new(Duration::from_secs(1));
        let err = connector
            .connect(&ScanTarget::from(addr), far_deadline(), 512)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Dial { .. }));
    }

    #[tokio::test]
    async fn test_proxy_target_is_rejected() {
        let target = ScanTarget::new("127.0.0.1".parse().unwrap(), 1099).with_proxy(ProxyDescriptor {
            address: "127.0.0.1:1080".parse().unwrap(),
            username: None,
        });

        let err = TargetConnector::default()
            .connect(&target, far_deadline(), 512)
            .await
            .unwrap_err();

        match err {
            ScanError::Dial { source, .. } => assert_eq!(source.kind(), io::ErrorKind::Unsupported),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client, far_deadline(), 64);
        conn.close().await;

        let err = conn.write_all(b"PING\r\n").await.unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
    }

    /// Accepts connections and holds them open without ever answering
    async fn silent_listener() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_tls_connect_timeout_is_dial_error() {
        let addr = silent_listener().await;
        let target = ScanTarget::from(addr).with_tls(true);

        let connector = TargetConnector::new(Duration::from_millis(200));
        let err = connector
            .connect(&target, far_deadline(), 512)
            .await
            .unwrap_err();

        match err {
            ScanError::Dial { addr: failed, source } => {
                assert_eq!(failed, addr);
                assert_eq!(source.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tls_handshake_past_scan_deadline_is_timeout() {
        let addr = silent_listener().await;
        let target = ScanTarget::from(addr).with_tls(true);

        let connector = TargetConnector::new(Duration::from_secs(5));
        let deadline = Instant::now() + Duration::from_millis(200);
        let err = connector.connect(&target, deadline, 512).await.unwrap_err();

        assert!(matches!(
            err,
            ScanError::Timeout {
                phase: ScanPhase::TlsHandshake,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_write_to_stalled_peer_times_out() {
        let (client, _server) = tokio::io::duplex(1);
        let mut conn = Connection::new(client, Instant::now() + Duration::from_millis(100), 64);

        let err = conn.write_all(&[b'x'; 64]).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Timeout {
                phase: ScanPhase::Write,
                ..
            }
        ));
        assert!(conn.close().await);
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client, far_deadline(), 64);

        conn.write_all(b"HELO\n").await.unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"HELO\n");
    }
}
