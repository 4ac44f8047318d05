//! Configuration module for the banner scanner

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ScanError;
use crate::frame::Terminator;
use crate::probe::{ProbeDefinition, ProbeStep, ProtocolRegistry, ProtocolSettings, StatusCheck};

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout for establishing the connection in milliseconds
    pub connect_timeout: u64,

    /// Overall budget for one scan (connect plus every step) in milliseconds
    pub scan_timeout: u64,

    /// Read buffer size for probes that don't set their own
    pub max_frame_size: usize,

    /// Typed settings for the built-in protocols
    pub protocols: ProtocolSettings,

    /// Extra probes, registered after the built-ins
    pub probes: Vec<CustomProbe>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 5000,
            scan_timeout: 10_000,
            max_frame_size: 10_000,
            protocols: ProtocolSettings::default(),
            probes: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: u64) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_protocols(mut self, protocols: ProtocolSettings) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_probe(mut self, probe: CustomProbe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub fn scan_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.scan_timeout)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ScanError::Config(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| ScanError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// ~/.bannerscan.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bannerscan.toml")
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load_default_config() -> Self {
        let path = Self::default_path();

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.connect_timeout == 0 {
            return Err(ScanError::Config("Connect timeout must be greater than 0".to_string()));
        }

        if self.scan_timeout == 0 {
            return Err(ScanError::Config("Scan timeout must be greater than 0".to_string()));
        }

        if self.max_frame_size == 0 {
            return Err(ScanError::Config("Max frame size must be greater than 0".to_string()));
        }

        for probe in &self.probes {
            probe.compile(self)?.validate()?;
        }

        Ok(())
    }

    /// Built-ins configured from `protocols`, then the custom probes on top
    pub fn registry(&self) -> crate::Result<ProtocolRegistry> {
        let mut registry = ProtocolRegistry::with_builtins(&self.protocols)?;

        for probe in &self.probes {
            let definition = probe.compile(self)?;
            definition.validate()?;
            if registry.register(definition).is_some() {
                log::info!("Custom probe '{}' overrides the built-in definition", probe.name);
            }
        }

        Ok(registry)
    }
}

/// A probe declared in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomProbe {
    pub name: String,
    pub port: u16,

    #[serde(default)]
    pub description: Option<String>,

    /// Overrides the engine-wide max frame size
    #[serde(default)]
    pub max_frame_size: Option<usize>,

    pub steps: Vec<CustomStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomStep {
    pub label: Option<String>,

    /// Bytes to send; empty for a pure read
    pub send: String,

    pub terminator: String,

    /// Field name -> extraction pattern
    pub fields: BTreeMap<String, String>,

    pub status_field: Option<String>,
    pub success_codes: Vec<String>,
    pub flag: Option<String>,
}

impl CustomProbe {
    /// Turn the declaration into a runnable definition
    pub fn compile(&self, config: &EngineConfig) -> crate::Result<ProbeDefinition> {
        let mut definition = ProbeDefinition::new(&self.name, self.port)
            .with_scan_timeout(config.scan_timeout_duration())
            .with_max_frame_size(self.max_frame_size.unwrap_or(config.max_frame_size));

        if let Some(description) = &self.description {
            definition = definition.with_description(description.clone());
        }

        for (index, step) in self.steps.iter().enumerate() {
            definition = definition.with_step(step.compile(&self.name, index)?);
        }

        Ok(definition)
    }
}

impl CustomStep {
    fn compile(&self, probe: &str, index: usize) -> crate::Result<ProbeStep> {
        let label = self.label.clone().unwrap_or_else(|| format!("step{}", index));

        if self.terminator.is_empty() {
            return Err(ScanError::Config(format!(
                "Step '{}' of probe '{}' has no terminator",
                label, probe
            )));
        }

        let mut step = ProbeStep::send(label, self.send.clone(), Terminator::new(&self.terminator)?);

        for (name, pattern) in &self.fields {
            step = step.with_field(name, pattern)?;
        }

        match (&self.status_field, self.success_codes.is_empty()) {
            (Some(field), _) => step = step.with_status(StatusCheck::new(field.clone(), self.success_codes.clone())),
            (None, false) => {
                return Err(ScanError::Config(format!(
                    "Step '{}' of probe '{}' lists success codes without a status field",
                    step.label, probe
                )))
            }
            (None, true) => {}
        }

        if let Some(flag) = &self.flag {
            step = step.with_flag(flag.clone());
        }

        Ok(step)
    }
}
