//! Step sequencing over one connection
//!
//! `Idle -> Sending(0) -> AwaitingFrame(0) -> Sending(1) -> ... -> Complete`.
//! The first failing step moves the machine to `Failed(i)` and nothing after
//! it runs.

use log::{debug, trace};

use super::{ProbeDefinition, ProbeStep};
use crate::extract::ResultExtractor;
use crate::frame::FrameReader;
use crate::network::Connection;
use crate::scanner::ScanResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Sending(usize),
    AwaitingFrame(usize),
    Complete,
    Failed(usize),
}

/// Drives a definition's steps over a connection
pub struct ProbeProtocol<'a> {
    definition: &'a ProbeDefinition,
    state: ProbeState,
}

impl<'a> ProbeProtocol<'a> {
    pub fn new(definition: &'a ProbeDefinition) -> Self {
        Self {
            definition,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Run every step in order. On failure `result` keeps whatever the
    /// earlier steps produced.
    pub async fn run(&mut self, connection: &mut Connection, result: &mut ScanResult) -> crate::Result<()> {
        let definition = self.definition;
        for step in &definition.steps {
            if let Some(flag) = &step.flag {
                result.set_flag(flag, false);
            }
        }

        for (index, step) in definition.steps.iter().enumerate() {
            if let Err(e) = self.run_step(index, step, connection, result).await {
                debug!("{}: step {} ({}) failed: {}", definition.protocol, index, step.label, e);
                self.transition(ProbeState::Failed(index));
                return Err(e);
            }
        }

        self.transition(ProbeState::Complete);
        Ok(())
    }

    async fn run_step(
        &mut self,
        index: usize,
        step: &ProbeStep,
        connection: &mut Connection,
        result: &mut ScanResult,
    ) -> crate::Result<()> {
        self.transition(ProbeState::Sending(index));
        if !step.is_read_only() {
            connection.write_all(&step.send).await?;
        }

        self.transition(ProbeState::AwaitingFrame(index));
        let deadline = connection.deadline();
        let frame = FrameReader::read_frame(connection, &step.terminator, deadline).await?;
        debug!(
            "{}: step {} matched a {} byte frame",
            self.definition.protocol,
            index,
            frame.len()
        );

        let fields = ResultExtractor::extract(&frame, &step.fields);
        let status = step
            .status
            .as_ref()
            .map(|check| ResultExtractor::check_status(&fields, check));
        result.add_response(frame.text(), fields);

        if let Some(outcome) = status {
            outcome?;
        }
        if let Some(flag) = &step.flag {
            result.set_flag(flag, true);
        }
        Ok(())
    }

    fn transition(&mut self, next: ProbeState) {
        trace!("{}: {:?} -> {:?}", self.definition.protocol, self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScanError, ScanPhase};
    use crate::frame::Terminator;
    use crate::probe::StatusCheck;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_test::io::Builder;

    fn two_step() -> ProbeDefinition {
        ProbeDefinition::new("chat", 6667)
            .with_step(
                ProbeStep::send("hello", "HELLO\r\n", Terminator::new(r"(?-u)(?P<code>\d{3}) .*\r\n").unwrap())
                    .with_status(StatusCheck::new("code", ["001"])),
            )
            .with_step(
                ProbeStep::send("join", "JOIN #x\r\n", Terminator::line().unwrap())
                    .with_field("channel", r"JOIN (#\S+)")
                    .unwrap()
                    .with_flag("joined"),
            )
    }

    fn connection(mock: tokio_test::io::Mock, ms: u64) -> Connection {
        Connection::new(mock, Instant::now() + Duration::from_millis(ms), 1024)
    }

    #[tokio::test]
    async fn test_all_steps_complete() {
        let mock = Builder::new()
            .write(b"HELLO\r\n")
            .read(b"001 welcome\r\n")
            .write(b"JOIN #x\r\n")
            .read(b":me JOIN #x\r\n")
            .build();
        let mut conn = connection(mock, 1000);
        let definition = two_step();
        let mut protocol = ProbeProtocol::new(&definition);
        let mut result = ScanResult::new();

        protocol.run(&mut conn, &mut result).await.unwrap();

        assert_eq!(protocol.state(), ProbeState::Complete);
        assert_eq!(result.banner, "001 welcome");
        assert_eq!(result.responses.len(), 2);
        assert_eq!(result.field("code"), Some("001"));
        assert_eq!(result.field("channel"), Some("#x"));
        assert!(result.flag("joined"));
    }

    #[tokio::test]
    async fn test_status_rejection_halts() {
        let mock = Builder::new()
            .write(b"HELLO\r\n")
            .read(b"433 nick in use\r\n")
            .build();
        let mut conn = connection(mock, 1000);
        let definition = two_step();
        let mut protocol = ProbeProtocol::new(&definition);
        let mut result = ScanResult::new();

        let err = protocol.run(&mut conn, &mut result).await.unwrap_err();

        assert!(matches!(err, ScanError::Application { .. }));
        assert_eq!(protocol.state(), ProbeState::Failed(0));
        assert_eq!(result.banner, "433 nick in use");
        assert_eq!(result.responses.len(), 1);
        assert!(!result.flag("joined"));
        assert_eq!(result.flags.get("joined"), Some(&false));
    }

    #[tokio::test]
    async fn test_second_step_timeout_keeps_first_response() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Connection::new(client, Instant::now() + Duration::from_millis(100), 1024);

        let server = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut buf = [0u8; 7];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(b"001 hi\r\n").await.unwrap();
            // Swallow the JOIN and never answer
            let mut rest = [0u8; 9];
            server.read_exact(&mut rest).await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        });

        let definition = two_step();
        let mut protocol = ProbeProtocol::new(&definition);
        let mut result = ScanResult::new();
        let err = protocol.run(&mut conn, &mut result).await.unwrap_err();

        assert!(matches!(err, ScanError::Timeout { phase: ScanPhase::Read, .. }));
        assert_eq!(protocol.state(), ProbeState::Failed(1));
        assert_eq!(result.responses, vec!["001 hi\r\n".to_string()]);
        server.abort();
    }

    #[tokio::test]
    async fn test_read_only_step_skips_write() {
        let mock = Builder::new().read(b"AJP/1.3 1.3\r\n").build();
        let mut conn = connection(mock, 1000);
        let definition = ProbeDefinition::new("ajp13", 8009).with_step(ProbeStep::read(
            "banner",
            Terminator::new(r"AJP/1\.3 (?P<version>\d+\.\d+)\r?\n").unwrap(),
        ));
        let mut protocol = ProbeProtocol::new(&definition);
        let mut result = ScanResult::new();

        protocol.run(&mut conn, &mut result).await.unwrap();

        assert_eq!(result.field("version"), Some("1.3"));
    }
}
