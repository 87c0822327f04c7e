use crate::model::{Frequency, Unit};
use std::path::PathBuf;

/// Arguments for the build command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct BuildArgs {
    /// Perf dump output directory
    pub dump_dir: PathBuf,

    /// Output path for the JSON report
    pub output_json: PathBuf,

    /// Display unit applied before the report is written
    pub unit: Unit,

    /// Clock used when the unit is nanoseconds
    pub frequency: Frequency,

    /// Input indices to include (None = every input in the dump)
    pub inputs: Option<Vec<u32>>,

    /// Capture locations to include (None = every location in the dump)
    pub locations: Option<Vec<String>>,

    /// Include per-core rows under every operation
    pub expand_cores: bool,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for BuildArgs {
    fn default() -> Self {
        Self {
            dump_dir: PathBuf::new(),
            output_json: PathBuf::from("report.json"),
            unit: Unit::Cycles,
            frequency: Frequency::Derived,
            inputs: None,
            locations: None,
            expand_cores: false,
            print_summary: false,
        }
    }
}
