//! Frame terminators
//!
//! A terminator only accepts the buffer when the pattern spans all of it, from
//! the first byte to the current end. A multi-line banner whose first line
//! happens to satisfy the pattern is therefore never cut short.

use bytes::Bytes;
use regex::bytes::Regex;
use std::collections::HashMap;
use std::fmt;

use super::Frame;

#[derive(Clone)]
pub struct Terminator {
    pattern: String,
    regex: Regex,
}

impl Terminator {
    /// Compile `pattern`, anchored at both ends of the accumulated buffer
    pub fn new(pattern: &str) -> crate::Result<Self> {
        let regex = Regex::new(&format!(r"\A(?:{})\z", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Any buffer ending in a line feed
    pub fn line() -> crate::Result<Self> {
        Self::new(r"(?s-u).*\n")
    }

    /// Any non-empty buffer
    pub fn any() -> crate::Result<Self> {
        Self::new(r"(?s-u).+")
    }

    /// The pattern as written, without the anchoring
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, buffer: &[u8]) -> bool {
        self.regex.is_match(buffer)
    }

    /// Match the whole buffer, returning it as a frame with its captures
    pub fn match_frame(&self, buffer: &[u8]) -> Option<Frame> {
        let captures = self.regex.captures(buffer)?;

        let groups = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned()))
            .collect();

        let named: HashMap<String, String> = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), String::from_utf8_lossy(m.as_bytes()).into_owned()))
            })
            .collect();

        Some(Frame::new(Bytes::copy_from_slice(buffer), groups, named))
    }
}

impl fmt::Debug for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Terminator").field(&self.pattern).finish()
    }
}
