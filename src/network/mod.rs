//! Transport layer: dialing targets and owning the per-scan connection

pub mod connector;
pub mod tls;

pub use connector::{Connect, Connection, Stream, TargetConnector};
pub use tls::TlsInfo;
