//! perfdump CLI
//!
//! Aggregates AI accelerator perf dumps into an operation timeline and
//! writes it as a JSON report in cycles or nanoseconds.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use std::path::PathBuf;

use perfdump_timeline::commands::{
    display_locations, display_version, execute_build, validate_args, validate_report_file,
    BuildArgs,
};
use perfdump_timeline::model::{Frequency, Unit};

/// perfdump - timeline aggregation for accelerator perf dumps
#[derive(Parser, Debug)]
#[command(name = "perfdump")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a timeline report from a perf dump directory
    Build {
        /// Perf dump output directory
        #[arg(short, long, env = "PERFDUMP_DIR")]
        dump: PathBuf,

        /// Output path for JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Display unit
        #[arg(long, value_enum, default_value_t = UnitArg::Cycles)]
        unit: UnitArg,

        /// Clock used for nanoseconds
        #[arg(long, value_enum, default_value_t = FrequencyArg::Derived)]
        frequency: FrequencyArg,

        /// Input indices to include, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        inputs: Option<Vec<u32>>,

        /// Capture locations to include, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        locations: Option<Vec<String>>,

        /// Include per-core rows for every operation
        #[arg(long)]
        expand_cores: bool,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// List capture locations in a perf dump directory
    Locations {
        /// Perf dump output directory
        #[arg(short, long, env = "PERFDUMP_DIR")]
        dump: PathBuf,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnitArg {
    Cycles,
    Ns,
}

impl From<UnitArg> for Unit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Cycles => Unit::Cycles,
            UnitArg::Ns => Unit::Nanoseconds,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FrequencyArg {
    Derived,
    Aiclk,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Derived => Frequency::Derived,
            FrequencyArg::Aiclk => Frequency::Aiclk,
        }
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Build {
            dump,
            output,
            unit,
            frequency,
            inputs,
            locations,
            expand_cores,
            summary,
        } => {
            let args = BuildArgs {
                dump_dir: dump,
                output_json: output,
                unit: unit.into(),
                frequency: frequency.into(),
                inputs,
                locations,
                expand_cores,
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            execute_build(args)?;
        }

        Commands::Locations { dump } => {
            display_locations(dump)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
