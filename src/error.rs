//! Error handling for the banner-scanning engine
//!
//! Every failure a scan can hit is a `ScanError`. The status classifier folds
//! these into the closed `ScanOutcome` taxonomy; the error itself always rides
//! along as the cause.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// The blocking phase a deadline expired in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Connect,
    TlsHandshake,
    Write,
    Read,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPhase::Connect => write!(f, "connect"),
            ScanPhase::TlsHandshake => write!(f, "tls handshake"),
            ScanPhase::Write => write!(f, "write"),
            ScanPhase::Read => write!(f, "read"),
        }
    }
}

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Dial error to {addr}: {source}")]
    Dial {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Connection closed by peer before any bytes were received")]
    ConnectionClosed,

    #[error("Timeout during {phase} after {elapsed:?}")]
    Timeout { phase: ScanPhase, elapsed: Duration },

    #[error("Frame exceeded the {limit} byte buffer without matching its terminator")]
    FrameTooLarge { limit: usize },

    #[error("Peer closed the connection after {received} bytes without a complete frame")]
    PeerClosed { received: usize },

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("Application error: {field} was {code:?}, expected one of {expected:?}")]
    Application {
        field: String,
        code: String,
        expected: Vec<String>,
    },

    #[error("Status field '{0}' missing from a matched frame")]
    MissingStatusField(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl ScanError {
    /// Build a timeout error for `phase` measured from `started`
    pub fn timeout(phase: ScanPhase, started: tokio::time::Instant) -> Self {
        ScanError::Timeout {
            phase,
            elapsed: started.elapsed(),
        }
    }

    /// Failures before the connection carried any protocol bytes
    pub fn is_connection_level(&self) -> bool {
        matches!(self, ScanError::Dial { .. } | ScanError::ConnectionClosed | ScanError::Tls(_))
    }
}

/// IO error kinds that mean the peer tore the connection down
pub(crate) fn is_peer_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}
