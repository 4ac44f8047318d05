//! Scanner module containing the single-target scan engine

pub mod engine;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::network::TlsInfo;

pub use engine::{ScanEngine, ScanReport};

/// Everything one scan learned about its target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Text of the first frame, trailing line breaks trimmed
    pub banner: String,

    /// Extracted fields across all completed steps
    pub fields: BTreeMap<String, String>,

    /// Verbatim frame text, one entry per completed step
    pub responses: Vec<String>,

    /// Optional sub-steps and whether they succeeded
    pub flags: BTreeMap<String, bool>,

    /// Negotiated TLS parameters, when the connection was wrapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsInfo>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Record one completed step
    pub fn add_response(&mut self, text: String, fields: HashMap<String, String>) {
        if self.responses.is_empty() {
            self.banner = text.trim_end_matches(&['\r', '\n'][..]).to_string();
        }
        self.responses.push(text);
        self.fields.extend(fields);
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.flags.insert(name.to_string(), value);
    }
}
