//! Wait and stall interval extraction.
//!
//! Counters such as
//! `wait-for-incoming-tiles-outer-loop-0-operand-1-num-tiles-4` encode their
//! indices in the field name. They are parsed here, once, into a typed
//! [`WaitKey`]; nothing downstream looks at the string again.

use crate::model::{Rect, ThreadStage, WaitKey, WaitKind};
use crate::parser::fields::number_array;
use crate::utils::config::{PACK_STAGE_KEY, UNPACK_STAGE_KEY};
use log::{debug, warn};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Name prefix of each wait/stall counter
const WAIT_PREFIXES: [(WaitKind, &str); 4] = [
    (WaitKind::WaitForIncomingTiles, "wait-for-incoming-tiles"),
    (WaitKind::WaitForFreeTiles, "wait-for-free-tiles"),
    (WaitKind::UnpackStallOnMemory, "trisc-stall-on-dram-unpacker"),
    (WaitKind::PackStallOnMemory, "trisc-stall-on-dram-packer"),
];

fn wait_patterns() -> &'static [(WaitKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(WaitKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        WAIT_PREFIXES
            .iter()
            .map(|(kind, prefix)| {
                let pattern = format!(
                    r"^{}-outer-loop-(\d+)-operand-(\d+)-num-tiles-(\d+)$",
                    regex::escape(prefix)
                );
                let re = Regex::new(&pattern).expect("Failed to compile wait field pattern");
                (*kind, re)
            })
            .collect()
    })
}

/// Parse a wait/stall field name into a typed key
///
/// **Public** - returns `None` for any other field
pub fn parse_wait_key(field: &str, stage: ThreadStage) -> Option<WaitKey> {
    wait_patterns().iter().find_map(|(kind, re)| {
        let caps = re.captures(field)?;
        Some(WaitKey {
            kind: *kind,
            outer_loop: caps.get(1)?.as_str().parse().ok()?,
            operand: caps.get(2)?.as_str().parse().ok()?,
            num_tiles: caps.get(3)?.as_str().parse().ok()?,
            stage,
        })
    })
}

/// Collect every wait/stall interval sequence recorded for `input`
///
/// **Public** - used by the entity builder
///
/// Scans the `T0` and `T2` namespaces of a per-core record. Fields whose
/// outer-loop index differs from `input` belong to another input and are
/// ignored. A field whose start and end arrays differ in length is skipped
/// with a warning.
pub fn extract_waits(
    core_record: &Map<String, Value>,
    input: u32,
    label: &str,
) -> BTreeMap<WaitKey, Vec<Rect>> {
    let mut out = BTreeMap::new();

    for (stage_key, stage) in [
        (UNPACK_STAGE_KEY, ThreadStage::Unpack),
        (PACK_STAGE_KEY, ThreadStage::Pack),
    ] {
        let Some(fields) = core_record.get(stage_key).and_then(Value::as_object) else {
            continue;
        };

        for (field, value) in fields {
            let Some(key) = parse_wait_key(field, stage) else {
                continue;
            };
            if key.outer_loop != input {
                continue;
            }
            match parse_intervals(value) {
                Ok(rects) => {
                    out.insert(key, rects);
                }
                Err(reason) => {
                    warn!("{}: skipping {}/{}: {}", label, stage_key, field, reason);
                }
            }
        }
    }

    debug!("{}: {} wait/stall sequences for input {}", label, out.len(), input);
    out
}

/// Zip `start`/`end` arrays into rects
///
/// **Private** - internal helper for extract_waits
fn parse_intervals(value: &Value) -> Result<Vec<Rect>, String> {
    let starts = value
        .get("start")
        .and_then(number_array)
        .ok_or_else(|| "missing or non-numeric start".to_string())?;
    let ends = value
        .get("end")
        .and_then(number_array)
        .ok_or_else(|| "missing or non-numeric end".to_string())?;

    if starts.len() != ends.len() {
        return Err(format!(
            "{} start values but {} end values",
            starts.len(),
            ends.len()
        ));
    }

    Ok(starts
        .into_iter()
        .zip(ends)
        .map(|(start, end)| Rect::new(start, end))
        .collect())
}
