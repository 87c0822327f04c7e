//! Raw record parsing.
//!
//! This module handles:
//! - Extracting identity from composite keys and capture location paths
//! - Defensive access to numeric fields under legacy/current names
//! - Normalizing the three raw sources down to valid records

pub mod fields;
pub mod identifier;
pub mod normalizer;
pub mod schema;

// Re-export main types
pub use identifier::{
    classify_location, full_name, parse_input_index, parse_op_identifier, CoreCoord,
    LocationKind, OpIdentity,
};
pub use normalizer::{normalize, DeviceInfo, NormalizedDump, OpRecord};
pub use schema::{FolderTree, RawDump, Selection};
