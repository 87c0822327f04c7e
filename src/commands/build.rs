//! Build command implementation.
//!
//! The build command:
//! 1. Loads the perf dump directory
//! 2. Resolves the selection
//! 3. Builds the timeline model
//! 4. Switches to the requested unit and frequency
//! 5. Writes the report

use super::models::BuildArgs;
use crate::aggregator::build_model;
use crate::loader::load_dump;
use crate::output::{build_report, generate_text_summary, write_report, TimelineReport};
use crate::parser::{RawDump, Selection};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::Instant;

/// Execute the build command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Build command arguments
///
/// # Returns
/// The report that was written
///
/// # Errors
/// * Dump directory missing, unreadable or empty
/// * File write errors
pub fn execute_build(args: BuildArgs) -> Result<TimelineReport> {
    let start_time = Instant::now();

    info!("Starting build for dump: {}", args.dump_dir.display());

    // Step 1: Load dump
    info!("Step 1/5: Loading perf dump...");
    let dump = load_dump(&args.dump_dir)
        .with_context(|| format!("Failed to load perf dump {}", args.dump_dir.display()))?;
    if dump.is_empty() {
        anyhow::bail!("No perf dump data found in {}", args.dump_dir.display());
    }

    // Step 2: Resolve selection
    info!("Step 2/5: Resolving selection...");
    let selection = resolve_selection(&dump, &args);
    debug!(
        "Selected locations {:?}, inputs {:?}",
        selection.locations, selection.inputs
    );

    // Step 3: Build model
    info!("Step 3/5: Building timeline model...");
    let mut model = build_model(&dump, &selection);

    // Step 4: Apply unit
    info!("Step 4/5: Switching to {:?} ({:?} clock)...", args.unit, args.frequency);
    model.switch_to_frequency(args.frequency);
    model.switch_to_unit(args.unit);

    // Step 5: Write report
    info!("Step 5/5: Writing report...");
    let expanded: BTreeSet<String> = if args.expand_cores {
        model.ops().map(|op| op.full_name.clone()).collect()
    } else {
        BTreeSet::new()
    };
    let report = build_report(&model, &selection, &expanded);

    write_report(&report, &args.output_json).context("Failed to write report JSON")?;
    info!("✓ Report written to: {}", args.output_json.display());

    if args.print_summary {
        println!("\n{}", "=".repeat(80));
        println!("TIMELINE SUMMARY");
        println!("{}", "=".repeat(80));
        println!("Dump:        {}", args.dump_dir.display());
        println!(
            "Locations:   {} device, {} host",
            model.device_locations().count(),
            model.host_locations().count()
        );
        println!("Operations:  {}", model.len());
        println!("Clocked devices: {}", model.clocks().len());
        println!("\n{}", generate_text_summary(&report, 20));
        println!("{}", "=".repeat(80));
    }

    let elapsed = start_time.elapsed();
    info!("Build completed in {:.2}s", elapsed.as_secs_f64());

    Ok(report)
}

/// Everything in the dump, narrowed by the requested locations and inputs
///
/// **Private** - internal helper for execute_build
fn resolve_selection(dump: &RawDump, args: &BuildArgs) -> Selection {
    let mut selection = Selection::all(dump);

    if let Some(locations) = &args.locations {
        for location in locations {
            if !selection.locations.contains(location) {
                warn!("Requested location '{}' is not in the dump", location);
            }
        }
        selection.locations = locations.iter().cloned().collect();
    }
    if let Some(inputs) = &args.inputs {
        selection.inputs = inputs.iter().copied().collect();
    }

    selection
}

/// Validate build arguments
///
/// **Public** - can be called before execute_build for early validation
pub fn validate_args(args: &BuildArgs) -> Result<()> {
    if args.dump_dir.as_os_str().is_empty() {
        anyhow::bail!("Dump directory cannot be empty");
    }

    if args.output_json.as_os_str().is_empty() {
        anyhow::bail!("Output path cannot be empty");
    }

    if args.inputs.as_ref().is_some_and(Vec::is_empty) {
        anyhow::bail!("--inputs needs at least one input index");
    }

    if args.locations.as_ref().is_some_and(Vec::is_empty) {
        anyhow::bail!("--locations needs at least one capture location");
    }

    Ok(())
}
