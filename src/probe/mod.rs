//! Probe definitions
//!
//! A probe is an ordered list of send/await steps. Each step carries the bytes
//! to write (possibly none), the terminator that recognises a complete reply
//! and the patterns that pull labeled fields out of it.

pub mod builtin;
pub mod protocol;
pub mod registry;

pub use builtin::ProtocolSettings;
pub use protocol::{ProbeProtocol, ProbeState};
pub use registry::ProtocolRegistry;

use regex::Regex;
use std::time::Duration;

use crate::error::ScanError;
use crate::frame::Terminator;

/// Default overall budget for one scan
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read buffer size
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10_000;

/// A labeled extraction pattern
#[derive(Debug, Clone)]
pub struct FieldPattern {
    name: String,
    regex: Regex,
}

impl FieldPattern {
    pub fn new(name: impl Into<String>, pattern: &str) -> crate::Result<Self> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// First match against `text`: capture group 1 when the pattern has one,
    /// the whole match otherwise.
    pub fn apply(&self, text: &str) -> Option<String> {
        let captures = self.regex.captures(text)?;
        if self.regex.captures_len() > 1 {
            captures.get(1).map(|m| m.as_str().to_string())
        } else {
            captures.get(0).map(|m| m.as_str().to_string())
        }
    }
}

/// Status field and the codes that count as success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCheck {
    pub field: String,
    pub success_codes: Vec<String>,
}

impl StatusCheck {
    pub fn new<I, S>(field: impl Into<String>, success_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            success_codes: success_codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, code: &str) -> bool {
        let code = code.trim();
        self.success_codes.iter().any(|c| c.trim() == code)
    }
}

/// One send/await exchange
#[derive(Debug, Clone)]
pub struct ProbeStep {
    pub label: String,
    pub send: Vec<u8>,
    pub terminator: Terminator,
    pub fields: Vec<FieldPattern>,
    pub status: Option<StatusCheck>,
    /// Flag set in the result when this step succeeds
    pub flag: Option<String>,
}

impl ProbeStep {
    /// Pure read step, e.g. a banner the server sends on connect
    pub fn read(label: impl Into<String>, terminator: Terminator) -> Self {
        Self::send(label, Vec::new(), terminator)
    }

    pub fn send(label: impl Into<String>, payload: impl Into<Vec<u8>>, terminator: Terminator) -> Self {
        Self {
            label: label.into(),
            send: payload.into(),
            terminator,
            fields: Vec::new(),
            status: None,
            flag: None,
        }
    }

    pub fn with_field(mut self, name: &str, pattern: &str) -> crate::Result<Self> {
        self.fields.push(FieldPattern::new(name, pattern)?);
        Ok(self)
    }

    pub fn with_status(mut self, status: StatusCheck) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.send.is_empty()
    }
}

/// Everything needed to scan one protocol
#[derive(Debug, Clone)]
pub struct ProbeDefinition {
    pub protocol: String,
    pub description: String,
    pub default_port: u16,
    pub steps: Vec<ProbeStep>,
    pub scan_timeout: Duration,
    pub max_frame_size: usize,
}

impl ProbeDefinition {
    pub fn new(protocol: impl Into<String>, default_port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            description: String::new(),
            default_port,
            steps: Vec::new(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: ProbeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Reject definitions the engine cannot run
    pub fn validate(&self) -> crate::Result<()> {
        if self.protocol.is_empty() {
            return Err(ScanError::Config("Protocol identifier cannot be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(ScanError::Config(format!("Probe '{}' has no steps", self.protocol)));
        }
        if self.scan_timeout.is_zero() {
            return Err(ScanError::Config(format!(
                "Probe '{}' needs a non-zero scan timeout",
                self.protocol
            )));
        }
        if self.max_frame_size == 0 {
            return Err(ScanError::Config(format!(
                "Probe '{}' needs a non-zero frame size",
                self.protocol
            )));
        }
        for step in &self.steps {
            if let Some(status) = &step.status {
                if status.success_codes.is_empty() {
                    return Err(ScanError::Config(format!(
                        "Step '{}' of '{}' checks {} without success codes",
                        step.label, self.protocol, status.field
                    )));
                }
            }
        }
        Ok(())
    }
}
