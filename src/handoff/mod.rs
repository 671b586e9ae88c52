//! Delivery of the aggregation result
//!
//! A result goes to one or more sinks: a JSON file on disk or a single framed
//! send to a peer process listening on a Unix socket.

mod file;
mod peer;

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::aggregate::AggregationResult;

pub use file::FileSink;
pub use peer::{read_frame, Frame, PeerSink, FRAME_HEADER_LEN, MAX_FRAME_LEN};

/// Default output path of the file sink
pub const DEFAULT_OUTPUT_PATH: &str = "results_analysis.json";

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot reach peer at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("send to peer failed: {0}")]
    Send(#[source] io::Error),
    #[error("malformed frame: {0}")]
    Frame(String),
}

/// Destination for a finished result
pub trait ResultSink {
    /// Deliver `result` exactly once. Blocks until the bytes are handed to the OS.
    fn deliver(&self, result: &AggregationResult) -> Result<(), HandoffError>;

    /// Short human-readable target, for logs
    fn describe(&self) -> String;
}

/// Deliver to every sink in order, stopping at the first failure
pub fn deliver_all(
    sinks: &[Box<dyn ResultSink>],
    result: &AggregationResult,
) -> Result<(), HandoffError> {
    for sink in sinks {
        sink.deliver(result)?;
        tracing::info!(target_sink = %sink.describe(), "result delivered");
    }
    Ok(())
}

/// Compact single-line JSON, used on the wire
pub fn to_compact_json(result: &AggregationResult) -> Result<Vec<u8>, HandoffError> {
    Ok(serde_json::to_vec(result)?)
}

/// Pretty JSON with a four-space indent, used for files
pub fn to_pretty_json(result: &AggregationResult) -> Result<Vec<u8>, HandoffError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    result.serialize(&mut serializer)?;
    Ok(buf)
}
