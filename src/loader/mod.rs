//! Filesystem access for perf dump directories.

pub mod dump;

pub use dump::{classify_file, list_locations, load_dump, DumpFile};
