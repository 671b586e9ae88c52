use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io::{self, Write};

use aqstore::cli::{Cli, Command};
use aqstore::config::AqConfig;
use aqstore::config_file::{config_flags, ConfigFile};
use aqstore::platform::{is_broken_pipe, ExitCode};
use aqstore::runner::{self, RunReport};

fn main() {
    let cli = process_args_with_config();

    if let Err(e) = aqstore::logging::init(cli.verbose, cli.quiet) {
        eprintln!("aqstore: Error: {}", e);
        ExitCode::GeneralError.exit();
    }

    match run(cli) {
        Ok(()) => ExitCode::Success.exit(),
        Err(e) if is_broken_pipe(&e) => ExitCode::Success.exit(),
        Err(e) => {
            eprintln!("aqstore: Error: {:#}", e);
            ExitCode::GeneralError.exit();
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AqConfig::from_cli(&cli);
    let show_stats = config.stats;

    let report = match &cli.command {
        Command::Run { input, output } => {
            runner::run_local(&config.with_input(input).with_output(output))?
        }
        Command::Ingest { input } => runner::run_ingest(&config.with_input(input))?,
        Command::Analyze {
            output,
            attach,
            unlink,
        } => runner::run_analyze(&config.with_output(output).with_attach(attach, *unlink))?,
        Command::Dump { attach, limit } => {
            let config = config.with_attach(attach, false);
            let stdout = io::stdout();
            runner::run_dump(&config, *limit, stdout.lock())?;
            return Ok(());
        }
        Command::Unlink => {
            runner::run_unlink(&config)?;
            return Ok(());
        }
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "aqstore", &mut io::stdout());
            return Ok(());
        }
    };

    if show_stats {
        print_stats(&report);
    }
    Ok(())
}

fn print_stats(report: &RunReport) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}", report.format_stats());
}

/// Parse the command line with config-file defaults placed in front of it
fn process_args_with_config() -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();
    let (custom_path, ignore_config) = config_flags(&raw_args);

    let args = if ignore_config {
        raw_args
    } else {
        match ConfigFile::load_with_custom_path(custom_path.as_deref())
            .and_then(|config_file| config_file.process_args(raw_args))
        {
            Ok(args) => args,
            Err(e) => {
                eprintln!("aqstore: Error: {:#}", e);
                ExitCode::InvalidUsage.exit();
            }
        }
    };

    match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            if e.use_stderr() {
                ExitCode::InvalidUsage.exit();
            }
            // --help and --version
            ExitCode::Success.exit();
        }
    }
}
