//! Merges per-worker ingest statistics

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::stats::IngestStats;

#[derive(Debug)]
pub(crate) struct IngestTracker {
    stats: Mutex<IngestStats>,
    start_time: Instant,
}

impl IngestTracker {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(IngestStats::new()),
            start_time: Instant::now(),
        }
    }

    pub fn merge_worker_stats(&self, worker_stats: &IngestStats) {
        self.lock_stats().merge(worker_stats);
    }

    pub fn get_final_stats(&self) -> IngestStats {
        let mut stats = self.lock_stats().clone();
        stats.processing_time = self.start_time.elapsed();
        stats
    }

    fn lock_stats(&self) -> MutexGuard<'_, IngestStats> {
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("worker thread panicked, recovering ingest stats");
                poisoned.into_inner()
            }
        }
    }
}
