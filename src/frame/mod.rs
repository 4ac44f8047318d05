//! Terminator-delimited framing of response bytes

pub mod reader;
pub mod terminator;

pub use reader::FrameReader;
pub use terminator::Terminator;

use bytes::Bytes;
use std::collections::HashMap;

/// One logically complete response, plus the terminator's capture groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl Frame {
    pub fn new(bytes: Bytes, groups: Vec<Option<String>>, named: HashMap<String, String>) -> Self {
        Self { bytes, groups, named }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Frame content as text; invalid UTF-8 is replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Positional capture group `index` (1-based, like the regex crate)
    pub fn group(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(|g| g.as_deref())
    }

    pub fn named(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn named_groups(&self) -> &HashMap<String, String> {
        &self.named
    }
}
