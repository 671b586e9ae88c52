//! Input file discovery and the capacity pre-scan

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::decompression::InputReader;

/// File name patterns picked up under an input directory
pub const INPUT_PATTERNS: [&str; 3] = ["*.csv", "*.csv.gz", "*.csv.zst"];

/// Collect input files in a stable order.
///
/// A directory is searched recursively for [`INPUT_PATTERNS`]; a plain file is
/// taken as-is. The result is sorted by path so every run sees the same order.
pub fn discover_inputs(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("Input directory {} does not exist", root.display());
    }

    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = Vec::new();
    for pattern in INPUT_PATTERNS {
        let full = format!("{}/**/{}", base, pattern);
        let entries = glob::glob(&full)
            .with_context(|| format!("Invalid search pattern '{}'", full))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping unreadable directory entry"),
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Count lines across all inputs, decompressing where needed.
///
/// A final line without a trailing newline still counts. Files that cannot be
/// read contribute zero; the ingest pass reports them.
pub fn count_lines(paths: &[PathBuf]) -> u64 {
    paths
        .iter()
        .map(|path| match count_file_lines(path) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot pre-count lines");
                0
            }
        })
        .sum()
}

fn count_file_lines(path: &Path) -> Result<u64> {
    let mut reader = InputReader::open(path)?;
    let mut lines = 0u64;
    let mut last = None;
    loop {
        let buf = reader
            .fill_buf()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        last = buf.last().copied();
        let len = buf.len();
        reader.consume(len);
    }
    if matches!(last, Some(b) if b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}
