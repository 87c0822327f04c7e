//! Report construction and output writers.
//!
//! This module handles:
//! - Flattening a filtered view into a serializable report
//! - Writing and reading JSON reports
//! - Text summaries

pub mod json;
pub mod report;

// Re-export main functions
pub use json::{read_report, write_report};
pub use report::{
    build_report, generate_text_summary, CoreRow, HostRow, OpRow, ReportRow, TimelineReport,
    WaitRow,
};
