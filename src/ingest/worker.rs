//! Ingest worker: decode one file at a time and append its records

use anyhow::Result;
use crossbeam_channel::Receiver;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::decompression::InputReader;
use crate::parsers::CsvRecordParser;
use crate::record::EnvironmentalRecord;
use crate::stats::IngestStats;
use crate::store::SharedRecordStore;

use super::sequencer::{AbandonOnPanic, TurnSequencer};
use super::IngestConfig;

/// One input file and its position in discovery order
#[derive(Debug, Clone)]
pub(crate) struct FileTask {
    pub index: usize,
    pub path: PathBuf,
}

/// Everything a worker borrows from the pool for the duration of a run
#[derive(Clone, Copy)]
pub(crate) struct WorkerContext<'a> {
    pub store: &'a SharedRecordStore,
    pub sequencer: &'a TurnSequencer,
    pub parser: CsvRecordParser,
    pub config: &'a IngestConfig,
}

pub(crate) fn worker_thread(
    worker_id: usize,
    tasks: Receiver<FileTask>,
    ctx: WorkerContext<'_>,
) -> Result<IngestStats> {
    let _abandon = AbandonOnPanic(ctx.sequencer);
    let mut stats = IngestStats::new();

    while let Ok(task) = tasks.recv() {
        tracing::debug!(worker_id, file = %task.path.display(), "ingesting file");
        if ctx.config.preserve_order {
            ingest_ordered(&task, &ctx, &mut stats)?;
        } else {
            ingest_unordered(&task, &ctx, &mut stats)?;
        }
    }

    tracing::debug!(
        worker_id,
        appended = stats.records_appended,
        dropped = stats.records_dropped,
        "ingest worker finished"
    );
    Ok(stats)
}

/// Parse the whole file, then reserve in discovery order and copy.
fn ingest_ordered(task: &FileTask, ctx: &WorkerContext<'_>, stats: &mut IngestStats) -> Result<()> {
    let mut parsed = Vec::new();
    read_records(&task.path, &ctx.parser, stats, |record| {
        parsed.push(record);
        Ok(())
    })?;

    // Take the turn even for an unreadable or empty file so later files proceed
    let reservation = ctx
        .sequencer
        .run_in_turn(task.index, || ctx.store.reserve(parsed.len()))??;
    stats.records_dropped += reservation.dropped();
    stats.records_appended += reservation.fill(&parsed);
    Ok(())
}

/// Reserve and copy batch by batch as lines are decoded.
fn ingest_unordered(
    task: &FileTask,
    ctx: &WorkerContext<'_>,
    stats: &mut IngestStats,
) -> Result<()> {
    let batch_size = ctx.config.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut appended = 0;
    let mut dropped = 0;

    read_records(&task.path, &ctx.parser, stats, |record| {
        batch.push(record);
        if batch.len() >= batch_size {
            let outcome = ctx.store.append(&batch)?;
            appended += outcome.appended;
            dropped += outcome.dropped;
            batch.clear();
        }
        Ok(())
    })?;

    if !batch.is_empty() {
        let outcome = ctx.store.append(&batch)?;
        appended += outcome.appended;
        dropped += outcome.dropped;
    }
    stats.records_appended += appended;
    stats.records_dropped += dropped;
    Ok(())
}

/// Decode every line of `path` and hand each record to `sink`.
///
/// Unreadable files and mid-file read errors are logged and counted, not
/// returned. Only `sink` errors propagate.
fn read_records<F>(
    path: &Path,
    parser: &CsvRecordParser,
    stats: &mut IngestStats,
    mut sink: F,
) -> Result<()>
where
    F: FnMut(EnvironmentalRecord) -> Result<()>,
{
    let mut reader = match InputReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "cannot open input file");
            stats.files_failed += 1;
            return Ok(());
        }
    };

    let mut buf = Vec::new();
    let mut line_num = 0usize;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    file = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "read error, skipping rest of file"
                );
                stats.files_failed += 1;
                return Ok(());
            }
        }
        line_num += 1;
        stats.lines_read += 1;

        let line = String::from_utf8_lossy(&buf);

        match parser.parse_line(&line) {
            Ok(record) => {
                stats.records_parsed += 1;
                sink(record)?;
            }
            Err(e) => {
                let content = line.trim_end_matches(['\n', '\r']);
                tracing::warn!(
                    file = %path.display(),
                    line = line_num,
                    error = %e,
                    content,
                    "skipping malformed line"
                );
                stats.record_parse_error(format!("{}:{}: {}", path.display(), line_num, e));
            }
        }
    }

    stats.files_processed += 1;
    Ok(())
}
