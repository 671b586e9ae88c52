//! Parallel daily and hourly AQI means over a sealed record array
//!
//! Map: each worker scans one contiguous partition into local value lists.
//! Reduce: local lists are concatenated into a single accumulator under one
//! mutex. Finalize: means are taken from exact integer sums, so the output does
//! not depend on how many workers ran or in which order they merged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::thread;

use crate::record::EnvironmentalRecord;
use crate::stats::AggregationStats;

/// Mean AQI per day and per day and hour
///
/// Days sort lexicographically and hours numerically. A group without any
/// contributing reading is absent, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    #[serde(rename = "dailyAverage")]
    pub daily_average: BTreeMap<String, f64>,
    #[serde(rename = "hourlyAverage")]
    pub hourly_average: BTreeMap<String, BTreeMap<u8, f64>>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.daily_average.is_empty()
    }
}

/// Index values grouped by day and by day and hour
#[derive(Debug, Default)]
struct Groups {
    daily: BTreeMap<String, Vec<i32>>,
    hourly: BTreeMap<String, BTreeMap<u8, Vec<i32>>>,
    stats: AggregationStats,
}

impl Groups {
    fn scan(records: &[EnvironmentalRecord]) -> Self {
        let mut groups = Groups::default();
        for record in records {
            groups.stats.records_scanned += 1;
            let Some(day) = record.day() else {
                groups.stats.skipped_no_day += 1;
                continue;
            };
            let Some(index) = record.aqi() else {
                groups.stats.skipped_missing_index += 1;
                continue;
            };
            groups.stats.records_used += 1;

            match groups.daily.get_mut(day) {
                Some(values) => values.push(index),
                None => {
                    groups.daily.insert(day.to_owned(), vec![index]);
                }
            }

            match record.hour() {
                Some(hour) => {
                    if !groups.hourly.contains_key(day) {
                        groups.hourly.insert(day.to_owned(), BTreeMap::new());
                    }
                    if let Some(hours) = groups.hourly.get_mut(day) {
                        hours.entry(hour).or_default().push(index);
                    }
                }
                None => groups.stats.without_hour += 1,
            }
        }
        groups
    }

    /// Concatenate another worker's lists into these
    fn absorb(&mut self, other: Groups) {
        for (day, mut values) in other.daily {
            self.daily.entry(day).or_default().append(&mut values);
        }
        for (day, hours) in other.hourly {
            let target = self.hourly.entry(day).or_default();
            for (hour, mut values) in hours {
                target.entry(hour).or_default().append(&mut values);
            }
        }
        self.stats.merge(&other.stats);
    }

    fn finalize(self) -> (AggregationResult, AggregationStats) {
        let daily_average = self
            .daily
            .into_iter()
            .filter_map(|(day, values)| mean(&values).map(|m| (day, m)))
            .collect();
        let hourly_average = self
            .hourly
            .into_iter()
            .map(|(day, hours)| {
                let means: BTreeMap<u8, f64> = hours
                    .into_iter()
                    .filter_map(|(hour, values)| mean(&values).map(|m| (hour, m)))
                    .collect();
                (day, means)
            })
            .filter(|(_, hours)| !hours.is_empty())
            .collect();

        (
            AggregationResult {
                daily_average,
                hourly_average,
            },
            self.stats,
        )
    }
}

fn mean(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    Some(sum as f64 / values.len() as f64)
}

/// Fork-join map-reduce over a record slice
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    num_workers: usize,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl AggregationEngine {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn aggregate(&self, records: &[EnvironmentalRecord]) -> (AggregationResult, AggregationStats) {
        if records.is_empty() {
            return Groups::default().finalize();
        }

        let workers = self.num_workers.min(records.len());
        let chunk_size = records.len().div_ceil(workers);
        let accumulator = Mutex::new(Groups::default());

        thread::scope(|scope| {
            for (worker_id, partition) in records.chunks(chunk_size).enumerate() {
                let accumulator = &accumulator;
                scope.spawn(move || {
                    let local = Groups::scan(partition);
                    tracing::debug!(
                        worker_id,
                        scanned = local.stats.records_scanned,
                        days = local.daily.len(),
                        "aggregation partition done"
                    );
                    lock(accumulator).absorb(local);
                });
            }
        });

        let groups = match accumulator.into_inner() {
            Ok(groups) => groups,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (result, stats) = groups.finalize();
        tracing::info!(
            workers,
            scanned = stats.records_scanned,
            used = stats.records_used,
            days = result.daily_average.len(),
            "aggregation finished"
        );
        (result, stats)
    }
}

fn lock(accumulator: &Mutex<Groups>) -> MutexGuard<'_, Groups> {
    match accumulator.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
