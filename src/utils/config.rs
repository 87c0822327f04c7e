//! Configuration and constants for the aggregation engine.

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Sub-record value marking an input as unavailable for a core
pub const UNAVAILABLE_MARKER: &str = "N/A";

/// Summary block carried by every device capture location
pub const PER_EPOCH_EVENTS_KEY: &str = "per-epoch-events";
pub const DEVICE_ID_FIELD: &str = "device-id";
pub const AICLK_FIELD: &str = "AICLK";

/// Trailing path segment of host capture locations
pub const HOST_SEGMENT: &str = "host";

/// Thread-stage namespaces scanned for wait/stall counters
pub const UNPACK_STAGE_KEY: &str = "T0";
pub const PACK_STAGE_KEY: &str = "T2";

// Field names for per-input measurements (current name first, legacy second)
pub const START_FIELD_NAMES: &[&str] = &[
    "first-unpack-first-block-data-available",
    "unpack-first-block-data-available",
];
pub const END_FIELD_NAMES: &[&str] = &["last-pack-last-tile-popped", "pack-end-outer-loop"];
pub const MATH_UTILIZATION_FIELD_NAMES: &[&str] = &[
    "math-utilization-first-unpack-to-last-pack",
    "math-utilization-over-math-thread",
];
pub const MATH_ACTIVITY_FIELD_NAMES: &[&str] = &["math-activity"];

/// Per-operand unpack bandwidth fields: `trisc-bw-operand-input-<n>`
pub const UNPACK_BW_PREFIX: &str = "trisc-bw-operand-input-";
pub const PACK_BW_FIELD_NAMES: &[&str] = &["trisc-bw-operand-output-0"];

/// Timeline markers copied to the aggregated operation
pub const DRAM_READ_FIELD: &str = "dram-read-issued";
pub const DRAM_WRITE_FIELD: &str = "dram-write-sent";

/// Reference-model predictions
pub const MODEL_CYCLES_FIELD_NAMES: &[&str] = &["model-cycles-per-core"];
pub const MODEL_PROP_CYCLES_FIELD_NAMES: &[&str] = &["model-prop-cycles"];

/// Host-side field carrying the originating process
pub const PROCESS_ID_FIELD: &str = "process-id";

// Host fields that embed a device id as a numeric suffix
pub const DEVICE_RUNTIME_PREFIX: &str = "device-runtime-device-";
pub const DEVICE_START_CYCLE_PREFIX: &str = "device-start-cycle-aligned-device-";
pub const DEVICE_END_CYCLE_PREFIX: &str = "device-end-cycle-aligned-device-";

/// AICLK is reported in MHz; cycles per nanosecond is MHz / 1000
pub const MHZ_PER_CYCLES_PER_NS: f64 = 1000.0;

// Dump directory file names
pub const SILICON_FILE_PATTERN: &str = r"^perf_postprocess(_epoch_\d+)?\.json$";
pub const MODEL_FILE_PATTERN: &str = r"^runtime_table(_epoch_\d+)?\.json$";
pub const HOST_FILE_PATTERN: &str = r"^(.*)proc_(\d+)\.json$";
pub const GRAPH_FILE_PATTERN: &str = r"^perf_graph_(\S+)\.dot$";
