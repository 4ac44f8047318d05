//! Deadline-bounded frame reader
//!
//! Bytes are appended to the connection's buffer one read at a time and the
//! terminator is re-run against everything accumulated so far. Stop
//! conditions, in priority order: terminator match, deadline, full buffer,
//! peer close.
//!
//! A frame ends at the first read boundary where the whole buffer matches.
//! When a shorter prefix of the stream already satisfies the terminator, a
//! read that stops at that prefix yields the shorter frame, so the result
//! only ignores chunking for streams with a single matching prefix.

use bytes::BufMut;
use log::{debug, trace};
use tokio::io::AsyncReadExt;
use tokio::time::{timeout_at, Instant};

use super::{Frame, Terminator};
use crate::error::{is_peer_disconnect, ScanError, ScanPhase};
use crate::network::Connection;

pub struct FrameReader;

impl FrameReader {
    /// Read one frame terminated by `terminator` before `deadline`
    pub async fn read_frame(
        connection: &mut Connection,
        terminator: &Terminator,
        deadline: Instant,
    ) -> crate::Result<Frame> {
        let started = Instant::now();
        let capacity = connection.capacity();
        let received_before = connection.received();

        let (stream, buffer) = connection.io()?;
        buffer.clear();

        let outcome = loop {
            let room = capacity.saturating_sub(buffer.len());
            if room == 0 {
                debug!("Buffer of {} bytes filled without a terminator match", capacity);
                break Err(ScanError::FrameTooLarge { limit: capacity });
            }

            let read = {
                let mut limited = (&mut *buffer).limit(room);
                timeout_at(deadline, stream.read_buf(&mut limited)).await
            };

            match read {
                Err(_) => break Err(ScanError::timeout(ScanPhase::Read, started)),
                Ok(Ok(0)) => break Err(Self::closed(received_before, buffer.len())),
                Ok(Ok(n)) => {
                    trace!("Read {} bytes ({} buffered)", n, buffer.len());
                    if let Some(frame) = terminator.match_frame(&buffer[..]) {
                        break Ok(frame);
                    }
                }
                Ok(Err(e)) if is_peer_disconnect(&e) => {
                    break Err(Self::closed(received_before, buffer.len()))
                }
                Ok(Err(e)) => break Err(ScanError::Io(e)),
            }
        };

        let step_bytes = buffer.len();
        connection.record_received(step_bytes);
        outcome
    }

    /// Closure before any byte ever arrived is connection-level; otherwise
    /// the peer abandoned a frame midway.
    fn closed(received_before: usize, buffered: usize) -> ScanError {
        if received_before + buffered == 0 {
            ScanError::ConnectionClosed
        } else {
            ScanError::PeerClosed { received: buffered }
        }
    }
}
