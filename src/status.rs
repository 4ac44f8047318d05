//! Outcome taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

use crate::error::ScanError;

/// Terminal status of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOutcome {
    Success,
    DialError,
    Timeout,
    ProtocolError,
    ApplicationError,
    UnknownError,
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Success => "success",
            ScanOutcome::DialError => "dial-error",
            ScanOutcome::Timeout => "timeout",
            ScanOutcome::ProtocolError => "protocol-error",
            ScanOutcome::ApplicationError => "application-error",
            ScanOutcome::UnknownError => "unknown-error",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct StatusClassifier;

impl StatusClassifier {
    /// Map the failure that ended a scan (or none) to its outcome
    pub fn classify(error: Option<&ScanError>) -> ScanOutcome {
        let error = match error {
            None => return ScanOutcome::Success,
            Some(error) => error,
        };

        match error {
            e if e.is_connection_level() => ScanOutcome::DialError,
            ScanError::Timeout { .. } => ScanOutcome::Timeout,
            ScanError::Io(e) if e.kind() == io::ErrorKind::TimedOut => ScanOutcome::Timeout,
            ScanError::FrameTooLarge { .. } | ScanError::PeerClosed { .. } => ScanOutcome::ProtocolError,
            ScanError::Application { .. } => ScanOutcome::ApplicationError,
            _ => ScanOutcome::UnknownError,
        }
    }
}
