//! TLS client handshake
//!
//! Certificates are not validated: the handshake only needs to get far enough
//! to speak the wrapped protocol and record what the server presented.

use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::ssl::{SslConnector, SslMethod, SslRef, SslVerifyMode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::error::ScanError;
use crate::target::ScanTarget;

/// What the server negotiated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsInfo {
    pub version: String,
    pub cipher: String,
    pub peer_common_name: Option<String>,
}

impl TlsInfo {
    pub(crate) fn from_ssl(ssl: &SslRef) -> Self {
        let version = ssl.version_str().to_string();
        let cipher = ssl
            .current_cipher()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let peer_common_name = ssl.peer_certificate().and_then(|cert| {
            cert.subject_name()
                .entries_by_nid(Nid::COMMONNAME)
                .next()
                .and_then(|entry| entry.data().as_utf8().ok())
                .map(|data| data.to_string())
        });

        Self {
            version,
            cipher,
            peer_common_name,
        }
    }
}

fn tls_error(e: ErrorStack) -> ScanError {
    ScanError::Tls(e.to_string())
}

/// Run a client handshake over `tcp`. SNI is sent only when the target names a host.
pub async fn handshake(
    tcp: TcpStream,
    target: &ScanTarget,
) -> crate::Result<(SslStream<TcpStream>, TlsInfo)> {
    let mut builder = SslConnector::builder(SslMethod::tls()).map_err(tls_error)?;
    builder.set_verify(SslVerifyMode::NONE);
    let connector = builder.build();

    let mut config = connector.configure().map_err(tls_error)?;
    config.set_verify_hostname(false);

    let domain = match &target.server_name {
        Some(name) => name.clone(),
        None => {
            config.set_use_server_name_indication(false);
            target.ip.to_string()
        }
    };

    let ssl = config.into_ssl(&domain).map_err(tls_error)?;
    let mut stream = SslStream::new(ssl, tcp).map_err(tls_error)?;
    Pin::new(&mut stream)
        .connect()
        .await
        .map_err(|e| ScanError::Tls(e.to_string()))?;

    let info = TlsInfo::from_ssl(stream.ssl());
    Ok((stream, info))
}
