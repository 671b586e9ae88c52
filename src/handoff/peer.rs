//! One-shot framed send to a peer process
//!
//! Peers are addressed by rank: rank `r` listens on `<rendezvous>/rank-<r>.sock`.
//! A frame is `tag: u32 LE`, `len: u64 LE`, then `len` bytes of compact JSON.
//! The sender writes one frame, shuts down its write half and disconnects.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use super::{to_compact_json, HandoffError, ResultSink};
use crate::aggregate::AggregationResult;

pub const FRAME_HEADER_LEN: usize = 12;

/// Upper bound accepted by [`read_frame`]
pub const MAX_FRAME_LEN: u64 = 1 << 30;

/// A received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PeerSink {
    socket_path: PathBuf,
    rank: u32,
    tag: u32,
}

impl PeerSink {
    pub fn new<P: AsRef<Path>>(rendezvous_dir: P, rank: u32, tag: u32) -> Self {
        Self {
            socket_path: Self::socket_path_for(rendezvous_dir.as_ref(), rank),
            rank,
            tag,
        }
    }

    /// Socket a peer of `rank` listens on
    pub fn socket_path_for(rendezvous_dir: &Path, rank: u32) -> PathBuf {
        rendezvous_dir.join(format!("rank-{}.sock", rank))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn send(&self, payload: &[u8]) -> Result<(), HandoffError> {
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|source| HandoffError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        write_frame(&mut stream, self.tag, payload).map_err(HandoffError::Send)?;
        stream.shutdown(Shutdown::Write).map_err(HandoffError::Send)?;

        tracing::info!(
            rank = self.rank,
            tag = self.tag,
            bytes = payload.len(),
            sent_at_ms = chrono::Utc::now().timestamp_millis(),
            "result sent to peer"
        );
        Ok(())
    }
}

impl ResultSink for PeerSink {
    fn deliver(&self, result: &AggregationResult) -> Result<(), HandoffError> {
        let payload = to_compact_json(result)?;
        self.send(&payload)
    }

    fn describe(&self) -> String {
        format!("peer rank {} ({})", self.rank, self.socket_path.display())
    }
}

fn write_frame<W: Write>(writer: &mut W, tag: u32, payload: &[u8]) -> io::Result<()> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    header[..4].copy_from_slice(&tag.to_le_bytes());
    header[4..].copy_from_slice(&(payload.len() as u64).to_le_bytes());
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one frame, as a receiving peer would
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, HandoffError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HandoffError::Frame("connection closed before a full header".to_string())
        } else {
            HandoffError::Send(e)
        }
    })?;

    let tag = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[4..]);
    let len = u64::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(HandoffError::Frame(format!(
            "payload of {} bytes exceeds limit of {}",
            len, MAX_FRAME_LEN
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HandoffError::Frame(format!("payload truncated, expected {} bytes", len))
        } else {
            HandoffError::Send(e)
        }
    })?;
    Ok(Frame { tag, payload })
}
