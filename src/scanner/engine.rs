//! Single-target scan engine
//!
//! One call, one connection, one outcome. The engine keeps no per-scan state,
//! so a single instance can serve any number of concurrent scans.

use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;

use super::ScanResult;
use crate::error::ScanError;
use crate::network::{Connect, TargetConnector};
use crate::probe::{ProbeDefinition, ProbeProtocol};
use crate::status::{ScanOutcome, StatusClassifier};
use crate::target::ScanTarget;

/// Outcome of one scan plus whatever was gathered before it ended
#[derive(Debug)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub result: ScanResult,
    pub cause: Option<ScanError>,
    pub duration: Duration,
}

impl ScanReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn error_message(&self) -> Option<String> {
        self.cause.as_ref().map(|e| e.to_string())
    }
}

/// Main scanning engine
#[derive(Debug, Clone)]
pub struct ScanEngine<C: Connect = TargetConnector> {
    connector: C,
}

impl ScanEngine<TargetConnector> {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connector: TargetConnector::new(connect_timeout),
        }
    }
}

impl Default for ScanEngine<TargetConnector> {
    fn default() -> Self {
        Self {
            connector: TargetConnector::default(),
        }
    }
}

impl<C: Connect> ScanEngine<C> {
    pub fn with_connector(connector: C) -> Self {
        Self { connector }
    }

    /// Scan `target` within the definition's own time budget
    pub async fn scan(&self, target: &ScanTarget, definition: &ProbeDefinition) -> ScanReport {
        self.scan_within(target, definition, definition.scan_timeout).await
    }

    /// Scan `target`; `budget` bounds connect plus every step
    pub async fn scan_within(
        &self,
        target: &ScanTarget,
        definition: &ProbeDefinition,
        budget: Duration,
    ) -> ScanReport {
        let started = Instant::now();
        let deadline = started + budget;
        let mut result = ScanResult::new();

        let cause = self.run(target, definition, deadline, &mut result).await.err();
        let outcome = StatusClassifier::classify(cause.as_ref());
        let duration = started.elapsed();

        match &cause {
            None => info!(
                "{} {}: {} in {:?}",
                definition.protocol,
                target.socket_addr(),
                outcome,
                duration
            ),
            Some(e) => warn!(
                "{} {}: {} in {:?}: {}",
                definition.protocol,
                target.socket_addr(),
                outcome,
                duration,
                e
            ),
        }

        ScanReport {
            outcome,
            result,
            cause,
            duration,
        }
    }

    async fn run(
        &self,
        target: &ScanTarget,
        definition: &ProbeDefinition,
        deadline: Instant,
        result: &mut ScanResult,
    ) -> crate::Result<()> {
        definition.validate()?;

        let mut connection = self
            .connector
            .connect(target, deadline, definition.max_frame_size)
            .await?;
        result.tls = connection.tls_info().cloned();

        let outcome = ProbeProtocol::new(definition).run(&mut connection, result).await;

        connection.close().await;
        debug!(
            "Closed connection to {} after {} bytes",
            target.socket_addr(),
            connection.received()
        );
        outcome
    }
}
