use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{AttachArgs, Cli, OutputArgs};
use crate::handoff::{FileSink, PeerSink, ResultSink, DEFAULT_OUTPUT_PATH};
use crate::ingest::IngestConfig;

/// Main configuration struct for aqstore
#[derive(Debug, Clone)]
pub struct AqConfig {
    pub input: InputConfig,
    pub store: StoreConfig,
    pub performance: PerformanceConfig,
    pub output: OutputConfig,
    pub stats: bool,
}

/// Input configuration
#[derive(Debug, Clone, Default)]
pub struct InputConfig {
    pub path: Option<PathBuf>,
    /// Overrides the line pre-count
    pub capacity: Option<u64>,
}

/// Shared region configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub segment: String,
    pub expected_capacity: Option<u64>,
    pub wait_seal: Option<Duration>,
    pub unlink: bool,
}

/// Performance configuration
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub threads: usize,
    pub batch_size: usize,
    pub preserve_order: bool,
}

/// Where results go
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub file: Option<PathBuf>,
    pub peer: Option<PeerConfig>,
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub rank: u32,
    pub tag: u32,
    pub rendezvous_dir: PathBuf,
}

impl AqConfig {
    /// Configuration shared by every command; per-command arguments are applied
    /// with the `with_*` helpers.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            input: InputConfig {
                path: None,
                capacity: cli.capacity,
            },
            store: StoreConfig {
                segment: cli.segment.clone(),
                expected_capacity: None,
                wait_seal: None,
                unlink: false,
            },
            performance: PerformanceConfig {
                threads: cli.threads.unwrap_or_else(num_cpus::get).max(1),
                batch_size: cli.batch_size.max(1),
                preserve_order: !cli.no_preserve_order,
            },
            output: OutputConfig::default(),
            stats: cli.stats,
        }
    }

    pub fn with_input(mut self, path: &Path) -> Self {
        self.input.path = Some(path.to_path_buf());
        self
    }

    /// A file is written when asked for, or when there is no peer to send to
    pub fn with_output(mut self, args: &OutputArgs) -> Self {
        let peer = args.peer_rank.map(|rank| PeerConfig {
            rank,
            tag: args.tag,
            rendezvous_dir: args
                .rendezvous
                .clone()
                .unwrap_or_else(default_rendezvous_dir),
        });
        let file = match (&args.output, &peer) {
            (Some(path), _) => Some(path.clone()),
            (None, None) => Some(PathBuf::from(DEFAULT_OUTPUT_PATH)),
            (None, Some(_)) => None,
        };
        self.output = OutputConfig { file, peer };
        self
    }

    pub fn with_attach(mut self, args: &AttachArgs, unlink: bool) -> Self {
        self.store.expected_capacity = args.expect_capacity;
        self.store.wait_seal = args.wait_seal;
        self.store.unlink = unlink;
        self
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            num_workers: self.performance.threads,
            batch_size: self.performance.batch_size,
            preserve_order: self.performance.preserve_order,
        }
    }

    /// Result sinks in delivery order: file first, then peer
    pub fn sinks(&self) -> Vec<Box<dyn ResultSink>> {
        let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
        if let Some(path) = &self.output.file {
            sinks.push(Box::new(FileSink::new(path)));
        }
        if let Some(peer) = &self.output.peer {
            sinks.push(Box::new(PeerSink::new(
                &peer.rendezvous_dir,
                peer.rank,
                peer.tag,
            )));
        }
        sinks
    }
}

impl Default for AqConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            store: StoreConfig {
                segment: crate::cli::DEFAULT_SEGMENT.to_string(),
                expected_capacity: None,
                wait_seal: None,
                unlink: false,
            },
            performance: PerformanceConfig {
                threads: num_cpus::get(),
                batch_size: 1000,
                preserve_order: true,
            },
            output: OutputConfig {
                file: Some(PathBuf::from(DEFAULT_OUTPUT_PATH)),
                peer: None,
            },
            stats: false,
        }
    }
}

/// `$TMPDIR/aqstore`
pub fn default_rendezvous_dir() -> PathBuf {
    std::env::temp_dir().join("aqstore")
}
