//! Scan target description

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Proxy to reach the target through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    pub address: SocketAddr,
    pub username: Option<String>,
}

/// A single already-resolved target. Immutable for the duration of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub ip: IpAddr,
    pub port: u16,

    /// Wrap the connection in TLS before any protocol bytes
    pub tls: bool,

    pub proxy: Option<ProxyDescriptor>,

    /// Hostname to present via SNI when TLS is negotiated
    pub server_name: Option<String>,
}

impl ScanTarget {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            tls: false,
            proxy: None,
            server_name: None,
        }
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyDescriptor) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl From<SocketAddr> for ScanTarget {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}
