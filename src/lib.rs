// Core library for the aqstore air-quality pipeline

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod decompression;
pub mod handoff;
pub mod ingest;
pub mod logging;
pub mod parsers;
pub mod platform;
pub mod record;
pub mod runner;
pub mod stats;
pub mod store;
pub mod timestamp;

pub use aggregate::{AggregationEngine, AggregationResult};
pub use config::AqConfig;
pub use ingest::{IngestConfig, IngestPool};
pub use parsers::{CsvRecordParser, DecodeError};
pub use record::{EnvironmentalRecord, MISSING_AQI, RECORD_SIZE};
pub use stats::{AggregationStats, IngestStats};
pub use store::{SharedRecordStore, StoreError};
