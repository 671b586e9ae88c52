//! Parallel ingestion of CSV inputs into a record store
//!
//! A fixed pool of workers pulls files from a channel in discovery order. Each
//! worker decodes lines and appends through the store's slot reservation, so
//! the only contended step is a single atomic update per file (ordered mode)
//! or per batch (unordered mode).

mod discovery;
mod sequencer;
mod tracker;
mod worker;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use std::path::PathBuf;
use std::thread;

use crate::parsers::CsvRecordParser;
use crate::stats::IngestStats;
use crate::store::SharedRecordStore;

pub use discovery::{count_lines, discover_inputs, INPUT_PATTERNS};

use sequencer::TurnSequencer;
use tracker::IngestTracker;
use worker::{worker_thread, FileTask, WorkerContext};

/// Configuration for the ingest pool
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub num_workers: usize,
    /// Records per reservation in unordered mode
    pub batch_size: usize,
    /// Reserve slots in discovery order so overflow keeps the earliest records
    pub preserve_order: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            batch_size: 1000,
            preserve_order: true,
        }
    }
}

/// Fixed pool of ingest workers
#[derive(Debug, Clone, Default)]
pub struct IngestPool {
    config: IngestConfig,
}

impl IngestPool {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Decode `inputs` and append every valid record to `store`.
    ///
    /// Returns once all workers have joined. Parse errors and unreadable files
    /// are counted in the returned stats; store errors abort the run.
    pub fn ingest(&self, inputs: &[PathBuf], store: &SharedRecordStore) -> Result<IngestStats> {
        let tracker = IngestTracker::new();
        let sequencer = TurnSequencer::new();
        let parser = CsvRecordParser::new();

        let (task_sender, task_receiver) = unbounded();
        for (index, path) in inputs.iter().enumerate() {
            task_sender
                .send(FileTask {
                    index,
                    path: path.clone(),
                })
                .context("Failed to queue input file")?;
        }
        drop(task_sender);

        let num_workers = self.config.num_workers.clamp(1, inputs.len().max(1));
        tracing::info!(
            files = inputs.len(),
            workers = num_workers,
            ordered = self.config.preserve_order,
            capacity = store.capacity(),
            "starting ingestion"
        );

        thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(num_workers);
            for worker_id in 0..num_workers {
                let receiver = task_receiver.clone();
                let ctx = WorkerContext {
                    store,
                    sequencer: &sequencer,
                    parser,
                    config: &self.config,
                };
                let handle = thread::Builder::new()
                    .name(format!("aq-ingest-{}", worker_id))
                    .spawn_scoped(scope, move || worker_thread(worker_id, receiver, ctx))
                    .context("Failed to spawn ingest worker")?;
                handles.push(handle);
            }

            let mut first_error = None;
            for (idx, handle) in handles.into_iter().enumerate() {
                let outcome = handle
                    .join()
                    .unwrap_or_else(|e| panic!("Ingest worker {} panicked: {:?}", idx, e));
                match outcome {
                    Ok(stats) => tracker.merge_worker_stats(&stats),
                    Err(e) => {
                        tracing::error!(worker_id = idx, error = %e, "ingest worker failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
            first_error.map_or(Ok(()), Err)
        })?;

        let stats = tracker.get_final_stats();
        if stats.records_dropped > 0 {
            tracing::warn!(
                dropped = stats.records_dropped,
                capacity = store.capacity(),
                "store capacity exceeded, records dropped"
            );
        }
        tracing::info!(
            appended = stats.records_appended,
            parse_errors = stats.parse_errors,
            elapsed_ms = stats.processing_time.as_millis() as u64,
            "ingestion finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::read_fixed;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn line(station: &str, index: i32) -> String {
        format!("1,2,2024-01-01T05:00:00Z,O3,1,PPB,1,{index},1,{station},A,C,D\n")
    }

    /// `files` files of `per_file` lines each; station names encode (file, line)
    fn write_inputs(dir: &TempDir, files: usize, per_file: usize) -> Vec<PathBuf> {
        (0..files)
            .map(|f| {
                let path = dir.path().join(format!("part-{:03}.csv", f));
                let body: String = (0..per_file)
                    .map(|l| line(&format!("f{}l{}", f, l), (f * per_file + l) as i32))
                    .collect();
                fs::write(&path, body).unwrap();
                path
            })
            .collect()
    }

    fn pool(workers: usize, preserve_order: bool) -> IngestPool {
        IngestPool::new(IngestConfig {
            num_workers: workers,
            batch_size: 7,
            preserve_order,
        })
    }

    #[test]
    fn test_ordered_ingest_keeps_discovery_order() -> Result<()> {
        let dir = TempDir::new()?;
        let inputs = write_inputs(&dir, 6, 25);
        let store = SharedRecordStore::anonymous(150)?;

        let stats = pool(4, true).ingest(&inputs, &store)?;
        store.seal()?;

        assert_eq!(stats.records_appended, 150);
        assert_eq!(stats.records_dropped, 0);
        assert_eq!(stats.files_processed, 6);
        let indices: Vec<i32> = store.records()?.iter().map(|r| r.air_quality_index).collect();
        assert_eq!(indices, (0..150).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_overflow_keeps_first_capacity_records() -> Result<()> {
        let dir = TempDir::new()?;
        let inputs = write_inputs(&dir, 5, 10);
        let store = SharedRecordStore::anonymous(23)?;

        let stats = pool(3, true).ingest(&inputs, &store)?;
        store.seal()?;

        assert_eq!(stats.records_parsed, 50);
        assert_eq!(stats.records_appended, 23);
        assert_eq!(stats.records_dropped, 27);
        let records = store.records()?;
        assert_eq!(records.len(), 23);
        assert_eq!(read_fixed(&records[0].station_name), "f0l0");
        assert_eq!(read_fixed(&records[22].station_name), "f2l2");
        Ok(())
    }

    #[test]
    fn test_unordered_ingest_loses_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let inputs = write_inputs(&dir, 8, 40);
        let store = SharedRecordStore::anonymous(320)?;

        let stats = pool(8, false).ingest(&inputs, &store)?;
        store.seal()?;

        assert_eq!(stats.records_appended, 320);
        let seen: HashSet<i32> = store.records()?.iter().map(|r| r.air_quality_index).collect();
        assert_eq!(seen.len(), 320);

        // Order within a file is still preserved
        let file3: Vec<i32> = store
            .records()?
            .iter()
            .filter(|r| read_fixed(&r.station_name).starts_with("f3l"))
            .map(|r| r.air_quality_index)
            .collect();
        assert_eq!(file3, (120..160).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_unordered_overflow_reports_exact_drop_count() -> Result<()> {
        let dir = TempDir::new()?;
        let inputs = write_inputs(&dir, 4, 30);
        let store = SharedRecordStore::anonymous(100)?;

        let stats = pool(4, false).ingest(&inputs, &store)?;
        assert_eq!(stats.records_appended, 100);
        assert_eq!(stats.records_dropped, 20);
        assert_eq!(store.len(), 100);
        Ok(())
    }

    #[test]
    fn test_unreadable_file_does_not_stall_ordered_mode() -> Result<()> {
        let dir = TempDir::new()?;
        let mut inputs = write_inputs(&dir, 3, 5);
        inputs.insert(1, dir.path().join("missing.csv"));
        let store = SharedRecordStore::anonymous(15)?;

        let stats = pool(2, true).ingest(&inputs, &store)?;
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_processed, 3);
        assert_eq!(stats.records_appended, 15);
        Ok(())
    }

    #[test]
    fn test_malformed_lines_are_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("mixed.csv");
        fs::write(
            &path,
            format!("{}garbage\n1,2,3\n{}", line("a", 10), line("b", 20)),
        )?;
        let store = SharedRecordStore::anonymous(3)?;

        let stats = pool(1, true).ingest(&[path], &store)?;
        store.seal()?;

        assert_eq!(stats.parse_errors, 2);
        let indices: Vec<i32> = store.records()?.iter().map(|r| r.air_quality_index).collect();
        assert_eq!(indices, vec![10, 20]);
        Ok(())
    }

    #[test]
    fn test_sealed_store_aborts_ingest() -> Result<()> {
        let dir = TempDir::new()?;
        let inputs = write_inputs(&dir, 2, 3);
        let store = SharedRecordStore::anonymous(10)?;
        store.seal()?;

        assert!(pool(2, true).ingest(&inputs, &store).is_err());
        Ok(())
    }

    #[test]
    fn test_no_inputs() -> Result<()> {
        let store = SharedRecordStore::anonymous(1)?;
        let stats = pool(4, true).ingest(&[], &store)?;
        assert_eq!(stats.records_appended, 0);
        Ok(())
    }
}
