//! Protocol lookup table
//!
//! Built once by the entry point and handed to whoever picks definitions.
//! Nothing registers itself.

use log::debug;
use std::collections::HashMap;

use super::builtin::{self, ProtocolSettings};
use super::ProbeDefinition;
use crate::error::ScanError;

#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    definitions: HashMap<String, ProbeDefinition>,
    ports: HashMap<u16, String>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in protocol
    pub fn with_builtins(settings: &ProtocolSettings) -> crate::Result<Self> {
        let mut registry = Self::new();
        for definition in builtin::all(settings)? {
            registry.register(definition);
        }
        Ok(registry)
    }

    /// Add `definition`, replacing any protocol with the same identifier.
    /// Returns the replaced definition.
    pub fn register(&mut self, definition: ProbeDefinition) -> Option<ProbeDefinition> {
        let protocol = definition.protocol.clone();
        let replaced = self.definitions.insert(protocol.clone(), definition);

        if let Some(old) = &replaced {
            debug!("Replacing protocol definition '{}'", protocol);
            if self.ports.get(&old.default_port) == Some(&protocol) {
                self.ports.remove(&old.default_port);
            }
        }

        if let Some(definition) = self.definitions.get(&protocol) {
            self.ports.insert(definition.default_port, protocol);
        }
        replaced
    }

    pub fn get(&self, protocol: &str) -> Option<&ProbeDefinition> {
        self.definitions.get(protocol)
    }

    pub fn lookup(&self, protocol: &str) -> crate::Result<&ProbeDefinition> {
        self.get(protocol)
            .ok_or_else(|| ScanError::UnknownProtocol(protocol.to_string()))
    }

    /// Protocol whose default port is `port`
    pub fn for_port(&self, port: u16) -> Option<&ProbeDefinition> {
        self.ports.get(&port).and_then(|protocol| self.definitions.get(protocol))
    }

    /// Registered identifiers, sorted
    pub fn protocols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
