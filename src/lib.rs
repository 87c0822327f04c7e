//! perfdump-timeline
//!
//! Aggregation and unit conversion for AI accelerator perf dumps.
//!
//! A perf dump holds per-core silicon counters, optional model-predicted
//! reference counters and host process events, keyed by capture location.
//! This crate joins them into one timeline of operations, derives per-op
//! statistics across cores, correlates device cycles with host nanoseconds,
//! and projects the result into display-ordered rows.
//!
//! ## Getting Started
//!
//! ```bash
//! perfdump build --dump perf_out/ --unit ns -o report.json
//! ```
//!
//! Library use follows the same pipeline:
//! [`loader::load_dump`] -> [`aggregator::build_model`] ->
//! [`model::PerfModel::switch_to_unit`] -> [`view::filtered_view`].

pub mod aggregator;
pub mod commands;
pub mod loader;
pub mod model;
pub mod output;
pub mod parser;
pub mod utils;
pub mod view;
