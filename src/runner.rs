//! Command execution
//!
//! Composes discovery, the record store, ingestion, aggregation and handoff for
//! each topology: everything in one process over an anonymous region, or an
//! ingesting process and an analyzing process sharing a named region.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use crate::aggregate::{AggregationEngine, AggregationResult};
use crate::config::AqConfig;
use crate::handoff::deliver_all;
use crate::ingest::{count_lines, discover_inputs, IngestPool};
use crate::stats::{AggregationStats, IngestStats};
use crate::store::{SharedRecordStore, StoreError};

/// What a command did, for `--stats`
#[derive(Debug, Default)]
pub struct RunReport {
    pub capacity: u64,
    pub records: u64,
    pub ingest: Option<IngestStats>,
    pub aggregation: Option<AggregationStats>,
    pub result: Option<AggregationResult>,
}

impl RunReport {
    pub fn format_stats(&self) -> String {
        let mut lines = vec![format!(
            "Store: {} of {} slots used",
            self.records, self.capacity
        )];
        if let Some(ingest) = &self.ingest {
            lines.push(ingest.format_stats());
            for example in &ingest.error_examples {
                lines.push(format!("  {}", example));
            }
        }
        if let Some(aggregation) = &self.aggregation {
            lines.push(aggregation.format_stats());
        }
        lines.join("\n")
    }
}

/// Ingest, aggregate and deliver inside this process
pub fn run_local(config: &AqConfig) -> Result<RunReport> {
    let inputs = prepare_inputs(config)?;
    let capacity = provision_capacity(config, &inputs);
    let store = SharedRecordStore::anonymous(capacity)
        .context("Failed to allocate the record store")?;

    let ingest = ingest_and_seal(config, &inputs, &store)?;
    let (result, aggregation) = analyze_store(config, &store)?;
    deliver(config, &result)?;

    Ok(RunReport {
        capacity,
        records: store.len(),
        ingest: Some(ingest),
        aggregation: Some(aggregation),
        result: Some(result),
    })
}

/// Create the named region, fill it and seal it for an analyzer
pub fn run_ingest(config: &AqConfig) -> Result<RunReport> {
    let inputs = prepare_inputs(config)?;
    let capacity = provision_capacity(config, &inputs);
    let mut store = SharedRecordStore::create(&config.store.segment, capacity)
        .with_context(|| format!("Failed to create shared region '{}'", config.store.segment))?;

    // Keep the region only once it has been sealed
    store.set_unlink_on_drop(true);
    let ingest = ingest_and_seal(config, &inputs, &store)?;
    store.set_unlink_on_drop(false);

    tracing::info!(
        segment = %config.store.segment,
        records = store.len(),
        capacity,
        "shared region sealed"
    );
    Ok(RunReport {
        capacity,
        records: store.len(),
        ingest: Some(ingest),
        ..Default::default()
    })
}

/// Aggregate a sealed named region and deliver the result
pub fn run_analyze(config: &AqConfig) -> Result<RunReport> {
    let store = attach_sealed(config)?;
    let (result, aggregation) = analyze_store(config, &store)?;
    deliver(config, &result)?;

    if config.store.unlink {
        SharedRecordStore::unlink(&config.store.segment)?;
        tracing::info!(segment = %config.store.segment, "shared region unlinked");
    }

    Ok(RunReport {
        capacity: store.capacity(),
        records: store.len(),
        aggregation: Some(aggregation),
        result: Some(result),
        ..Default::default()
    })
}

const DUMP_HEADER: [&str; 13] = [
    "lat",
    "lon",
    "timestamp",
    "pollutant",
    "value",
    "unit",
    "baseline",
    "index",
    "risk_category",
    "station",
    "agency",
    "station_code",
    "detailed_station_code",
];

/// Write the records of a sealed named region as CSV. Returns the number written.
pub fn run_dump<W: Write>(config: &AqConfig, limit: Option<usize>, output: W) -> Result<usize> {
    let store = attach_sealed(config)?;
    let records = store.records()?;
    let records = &records[..limit.unwrap_or(records.len()).min(records.len())];

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(DUMP_HEADER)?;
    for record in records {
        let [timestamp, pollutant, unit, risk, station, agency, code, detailed] =
            record.text_fields();
        writer.write_record(&[
            record.lat.to_string(),
            record.lon.to_string(),
            timestamp.into_owned(),
            pollutant.into_owned(),
            record.measured_value.to_string(),
            unit.into_owned(),
            record.baseline_value.to_string(),
            record.air_quality_index.to_string(),
            risk.into_owned(),
            station.into_owned(),
            agency.into_owned(),
            code.into_owned(),
            detailed.into_owned(),
        ])?;
    }
    writer.flush().context("Failed to write CSV output")?;
    Ok(records.len())
}

/// Remove the named region. Returns `false` if it did not exist.
pub fn run_unlink(config: &AqConfig) -> Result<bool> {
    let removed = SharedRecordStore::unlink(&config.store.segment)?;
    if removed {
        tracing::info!(segment = %config.store.segment, "shared region unlinked");
    } else {
        tracing::warn!(segment = %config.store.segment, "no such shared region");
    }
    Ok(removed)
}

fn prepare_inputs(config: &AqConfig) -> Result<Vec<PathBuf>> {
    let root = config
        .input
        .path
        .as_deref()
        .ok_or_else(|| anyhow!("No input directory given"))?;
    let inputs = discover_inputs(root)?;
    if inputs.is_empty() {
        tracing::warn!(dir = %root.display(), "no input files found");
    } else {
        tracing::info!(files = inputs.len(), dir = %root.display(), "discovered input files");
    }
    Ok(inputs)
}

fn provision_capacity(config: &AqConfig, inputs: &[PathBuf]) -> u64 {
    match config.input.capacity {
        Some(capacity) => capacity,
        None => {
            let started = Instant::now();
            let lines = count_lines(inputs);
            tracing::debug!(
                lines,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pre-counted input lines"
            );
            lines
        }
    }
}

fn ingest_and_seal(
    config: &AqConfig,
    inputs: &[PathBuf],
    store: &SharedRecordStore,
) -> Result<IngestStats> {
    let stats = IngestPool::new(config.ingest_config()).ingest(inputs, store)?;
    store.seal()?;
    Ok(stats)
}

/// Attach to the named region and make sure it is sealed.
///
/// With a seal wait the analyzer may start before the ingester: both the region
/// appearing and the seal share one deadline.
fn attach_sealed(config: &AqConfig) -> Result<SharedRecordStore> {
    let segment = &config.store.segment;
    let expected = config.store.expected_capacity;
    let attach_context = || format!("Failed to attach to shared region '{}'", segment);

    let Some(timeout) = config.store.wait_seal else {
        let store = SharedRecordStore::attach(segment, expected).with_context(attach_context)?;
        if !store.is_sealed() {
            return Err(StoreError::NotSealed.into());
        }
        return Ok(store);
    };

    let started = Instant::now();
    let store = SharedRecordStore::attach_within(segment, expected, timeout)
        .with_context(attach_context)?;
    tracing::debug!(
        segment = %segment,
        waited_ms = started.elapsed().as_millis() as u64,
        "attached to shared region"
    );
    store
        .wait_sealed(timeout.saturating_sub(started.elapsed()))
        .map_err(|e| match e {
            StoreError::SealTimeout(_) => StoreError::SealTimeout(timeout),
            other => other,
        })?;
    Ok(store)
}

fn analyze_store(
    config: &AqConfig,
    store: &SharedRecordStore,
) -> Result<(AggregationResult, AggregationStats)> {
    let records = store.records()?;
    let started = Instant::now();
    let (result, stats) = AggregationEngine::new(config.performance.threads).aggregate(records);
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "time to analyze"
    );
    Ok((result, stats))
}

fn deliver(config: &AqConfig, result: &AggregationResult) -> Result<()> {
    deliver_all(&config.sinks(), result).context("Failed to deliver result")
}
