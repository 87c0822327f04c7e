use crate::loader::{list_locations, load_dump};
use crate::output::read_report;
use crate::parser::{FolderTree, LocationKind};
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use log::warn;
use std::path::PathBuf;

/// Validate a report JSON file
pub fn validate_report_file(file_path: PathBuf) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)
        .with_context(|| format!("Failed to read report {}", file_path.display()))?;

    if report.version != SCHEMA_VERSION {
        warn!(
            "Report schema v{} differs from current v{}",
            report.version,
            SCHEMA_VERSION
        );
    }

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Generated: {}", report.generated_at);
    println!("  Unit: {:?} ({:?} clock)", report.unit, report.frequency);
    if report.unconverted_ops > 0 {
        println!(
            "  Not converted: {} operations (missing clock data)",
            report.unconverted_ops
        );
    }
    println!("  Locations: {}", report.locations.len());
    println!("  Operations: {}", report.op_rows().count());
    println!("  Host Events: {}", report.host_rows().count());

    Ok(())
}

/// List the capture locations of a dump directory
pub fn display_locations(dump_dir: PathBuf) -> Result<()> {
    let dump = load_dump(&dump_dir)
        .with_context(|| format!("Failed to load perf dump {}", dump_dir.display()))?;

    let locations = list_locations(&dump);
    if locations.is_empty() {
        println!("No capture locations in {}", dump_dir.display());
        return Ok(());
    }

    println!("Capture locations in {}:", dump_dir.display());
    for (location, kind) in locations {
        let mut notes = Vec::new();
        if dump.graph_of(&location).is_some() {
            notes.push("graph");
        }
        if kind == LocationKind::Invalid {
            notes.push("ignored");
        }
        let note = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        println!("  {:<50} {}{}", location, kind, note);
    }

    println!("\nFolders:");
    print!("{}", format_folder_tree(&dump.folder_tree()));

    Ok(())
}

/// Indented folder listing, two spaces per level
///
/// **Private** - internal helper for display_locations
fn format_folder_tree(tree: &FolderTree) -> String {
    fn walk(tree: &FolderTree, depth: usize, out: &mut String) {
        for (name, child) in &tree.0 {
            out.push_str(&format!("{}{}/\n", "  ".repeat(depth + 1), name));
            walk(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    walk(tree, 0, &mut out);
    out
}

/// Display version information
pub fn display_version() {
    println!("perfdump v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Timeline aggregation for AI accelerator perf dumps.");
}
