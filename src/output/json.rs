//! JSON report writer and reader.
//!
//! Writes TimelineReport structs to JSON files with proper formatting.

use super::report::TimelineReport;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write a report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `report` - Report to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_report(report: &TimelineReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).map_err(OutputError::SerializationFailed)?;

    info!(
        "Report written successfully ({} rows, {} bytes)",
        report.rows.len(),
        calculate_file_size(output_path)
    );

    Ok(())
}

/// Validate that output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Calculate file size in bytes
///
/// **Private** - internal utility
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a report from a JSON file
///
/// **Public** - used by the validate command and tests
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<TimelineReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let report: TimelineReport =
        serde_json::from_reader(BufReader::new(file)).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Report loaded: version {}, {} rows",
        report.version,
        report.rows.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frequency, Unit};
    use crate::output::report::{HostRow, ReportRow};
    use tempfile::NamedTempFile;

    fn create_test_report() -> TimelineReport {
        TimelineReport {
            version: "1.0.0".to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
            unit: Unit::Nanoseconds,
            frequency: Frequency::Aiclk,
            unconverted_ops: 0,
            locations: vec!["t/host".to_string()],
            inputs: vec![0],
            rows: vec![ReportRow::Host(HostRow {
                name: "compile".to_string(),
                location: "t/host".to_string(),
                process_id: Some(7),
                boxes: vec![],
            })],
        }
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_report(&report, path).unwrap();
        let loaded = read_report(path).unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_validate_output_path_empty() {
        let result = validate_output_path(Path::new(""));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_output_path_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = validate_output_path(temp_dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }
}
