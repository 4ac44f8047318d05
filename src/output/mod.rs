//! Scan record output

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::IpAddr;

use crate::error::ScanError;
use crate::scanner::{ScanReport, ScanResult};
use crate::status::ScanOutcome;
use crate::target::ScanTarget;
use crate::utils::escape_bytes;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Json,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" | "jsonl" => Ok(OutputFormat::Json),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// One line of output per scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: String,
    pub status: ScanOutcome,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub result: ScanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanRecord {
    pub fn from_report(target: &ScanTarget, protocol: &str, report: &ScanReport) -> Self {
        Self {
            ip: target.ip,
            port: target.port,
            protocol: protocol.to_string(),
            status: report.outcome,
            timestamp: Utc::now(),
            duration_ms: report.duration.as_millis() as u64,
            result: report.result.clone(),
            error: report.error_message(),
        }
    }
}

/// Renders records in the chosen format
#[derive(Debug, Clone)]
pub struct OutputWriter {
    format: OutputFormat,
    colored: bool,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, colored: true }
    }

    pub fn with_colors(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn render(&self, record: &ScanRecord) -> crate::Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(record).map_err(|e| ScanError::Output(e.to_string())),
            OutputFormat::Text => Ok(self.format_text(record)),
        }
    }

    /// Write `record` followed by a newline
    pub fn write<W: Write>(&self, out: &mut W, record: &ScanRecord) -> crate::Result<()> {
        let rendered = self.render(record)?;
        writeln!(out, "{}", rendered)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_stdout(&self, record: &ScanRecord) -> crate::Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.write(&mut handle, record)
    }

    fn format_text(&self, record: &ScanRecord) -> String {
        let status = self.paint_status(record.status);
        let mut output = format!(
            "{}:{} {} {} ({} ms)",
            record.ip, record.port, record.protocol, status, record.duration_ms
        );

        if let Some(error) = &record.error {
            output.push_str(&format!("\n  error: {}", error));
        }
        if !record.result.banner.is_empty() {
            output.push_str(&format!("\n  banner: {}", escape_bytes(record.result.banner.as_bytes())));
        }
        for (name, value) in &record.result.fields {
            output.push_str(&format!("\n  {}: {}", name, escape_bytes(value.as_bytes())));
        }
        for (name, value) in &record.result.flags {
            output.push_str(&format!("\n  {}: {}", name, value));
        }
        if let Some(tls) = &record.result.tls {
            output.push_str(&format!("\n  tls: {} {}", tls.version, tls.cipher));
        }

        output
    }

    fn paint_status(&self, status: ScanOutcome) -> String {
        if !self.colored {
            return status.to_string();
        }

        match status {
            ScanOutcome::Success => status.as_str().green().bold().to_string(),
            ScanOutcome::ApplicationError => status.as_str().yellow().to_string(),
            ScanOutcome::Timeout => status.as_str().cyan().to_string(),
            _ => status.as_str().red().to_string(),
        }
    }
}
