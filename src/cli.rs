// Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Default name of the shared region
pub const DEFAULT_SEGMENT: &str = "/aqi_segment";

#[derive(Parser, Debug)]
#[command(name = "aqstore")]
#[command(about = "Parallel air-quality ingestion and aggregation over a shared-memory record store")]
#[command(
    long_about = "Parallel air-quality ingestion and aggregation over a shared-memory record store\n\nTOPOLOGIES:\n  run <dir>        ingest, aggregate and write results in one process\n  ingest <dir>     fill and seal a named shared region, then exit\n  analyze          attach to a sealed region and deliver the result\n\nCOMMON EXAMPLES:\n  aqstore run data/ -o results.json\n  aqstore --segment /aq ingest data/ && aqstore --segment /aq analyze --peer-rank 1\n\nDefaults may be placed in .aqstorerc as: defaults = --threads 8"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Worker threads for ingestion and aggregation (default: number of CPUs)
    #[arg(long, global = true, help_heading = "Performance Options")]
    pub threads: Option<usize>,

    /// Records per slot reservation in unordered mode
    #[arg(
        long = "batch-size",
        global = true,
        default_value_t = 1000,
        help_heading = "Performance Options"
    )]
    pub batch_size: usize,

    /// Reserve slots as batches are parsed instead of in file order
    #[arg(long = "no-preserve-order", global = true, help_heading = "Performance Options")]
    pub no_preserve_order: bool,

    /// Name of the shared memory region
    #[arg(long, global = true, default_value = DEFAULT_SEGMENT, help_heading = "Store Options")]
    pub segment: String,

    /// Record capacity (default: line count of all inputs)
    #[arg(long, global = true, help_heading = "Store Options")]
    pub capacity: Option<u64>,

    /// Print processing statistics to stderr
    #[arg(short = 's', long, global = true, help_heading = "Display Options")]
    pub stats: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true, help_heading = "Display Options")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, global = true, help_heading = "Display Options")]
    pub quiet: bool,

    /// Read defaults from this file instead of searching for .aqstorerc
    #[arg(long = "config-file", global = true, help_heading = "Configuration Options")]
    pub config_file: Option<PathBuf>,

    /// Do not read any config file
    #[arg(long = "ignore-config", global = true, help_heading = "Configuration Options")]
    pub ignore_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest, aggregate and deliver within this process
    Run {
        /// Directory of .csv (.csv.gz, .csv.zst) files, or a single file
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fill and seal the named shared region, leaving it for an analyzer
    Ingest {
        /// Directory of .csv (.csv.gz, .csv.zst) files, or a single file
        input: PathBuf,
    },
    /// Aggregate a sealed shared region and deliver the result
    Analyze {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        attach: AttachArgs,
        /// Remove the shared region afterwards
        #[arg(long)]
        unlink: bool,
    },
    /// Write the records of a sealed shared region to stdout as CSV
    Dump {
        #[command(flatten)]
        attach: AttachArgs,
        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Remove the shared region
    Unlink,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Result file (default: results_analysis.json unless sending to a peer)
    #[arg(short = 'o', long, help_heading = "Output Options")]
    pub output: Option<PathBuf>,

    /// Send the result to the peer of this rank
    #[arg(long = "peer-rank", help_heading = "Output Options")]
    pub peer_rank: Option<u32>,

    /// Message tag for the peer send
    #[arg(long, default_value_t = 0, help_heading = "Output Options")]
    pub tag: u32,

    /// Directory holding the peers' rank-<n>.sock sockets
    #[arg(long, help_heading = "Output Options")]
    pub rendezvous: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AttachArgs {
    /// Refuse a region whose capacity differs
    #[arg(long = "expect-capacity", help_heading = "Store Options")]
    pub expect_capacity: Option<u64>,

    /// Wait this long for the producer to seal the region (e.g. 5s, 500ms)
    #[arg(long = "wait-seal", value_parser = parse_duration, help_heading = "Store Options")]
    pub wait_seal: Option<Duration>,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| format!("invalid duration '{}': {}", value, e))
}
