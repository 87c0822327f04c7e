//! Aggregation of raw per-core records into the timeline model.
//!
//! This module transforms normalized records into:
//! - Aggregated operations with their per-core instances
//! - Derived bounds, utilization and bandwidth statistics
//! - Per-device clock parameters for nanosecond conversion

pub mod builder;
pub mod clock;
pub mod stats;
pub mod waits;

// Re-export main types and functions
pub use builder::build_model;
pub use clock::correlate_clocks;
pub use stats::{compute_op_stats, median};
pub use waits::parse_wait_key;
