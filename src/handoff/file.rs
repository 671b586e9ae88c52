use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{to_pretty_json, HandoffError, ResultSink};
use crate::aggregate::AggregationResult;

/// Writes the result as pretty JSON, replacing any existing file
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for FileSink {
    fn deliver(&self, result: &AggregationResult) -> Result<(), HandoffError> {
        let body = to_pretty_json(result)?;
        let write_err = |source| HandoffError::Write {
            path: self.path.clone(),
            source,
        };

        let file = File::create(&self.path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&body).map_err(write_err)?;
        writer.write_all(b"\n").map_err(write_err)?;
        writer.flush().map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), bytes = body.len(), "result file written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
