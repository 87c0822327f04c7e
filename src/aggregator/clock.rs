//! Host/device clock correlation.
//!
//! The host records wall-clock runtime (ns) for each device, and the device
//! records cycle counters aligned to the same start and end. The ratio gives
//! the effective device frequency used to place cycle timestamps on the host
//! timeline.

use crate::model::{ClockParams, ClockTable};
use crate::parser::fields::{number_array, parse_json_f64};
use crate::parser::identifier::parent_path;
use crate::parser::NormalizedDump;
use crate::utils::config::{
    DEVICE_END_CYCLE_PREFIX, DEVICE_RUNTIME_PREFIX, DEVICE_START_CYCLE_PREFIX,
    MHZ_PER_CYCLES_PER_NS,
};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Derive clock parameters for every device referenced by a host location
///
/// **Public** - main entry point for clock correlation
///
/// # Arguments
/// * `norm` - Normalized dump; host events and device summaries are read from it
///
/// # Returns
/// Table keyed by (host location, device id). A device whose inputs are
/// incomplete is left out and logged; the others are unaffected.
pub fn correlate_clocks(norm: &NormalizedDump<'_>) -> ClockTable {
    let mut table = ClockTable::default();

    for (&host_location, events) in &norm.host {
        let devices = device_ids(events);
        debug!(
            "Host location '{}' references {} devices",
            host_location,
            devices.len()
        );

        for device_id in devices {
            match correlate_device(norm, host_location, events, device_id) {
                Ok(params) => {
                    debug!(
                        "{} device {}: {:.4} cycles/ns derived, start cycle {}",
                        host_location, device_id, params.derived_frequency, params.start_cycle
                    );
                    table.insert(host_location, device_id, params);
                }
                Err(reason) => {
                    warn!(
                        "No clock data for {} device {}: {}",
                        host_location, device_id, reason
                    );
                }
            }
        }
    }

    info!("Correlated clocks for {} devices", table.len());
    table
}

/// Device ids named by the device-scoped host fields
///
/// **Private** - internal helper for correlate_clocks
fn device_ids(events: &Map<String, Value>) -> BTreeSet<u32> {
    events
        .keys()
        .filter_map(|name| {
            [
                DEVICE_RUNTIME_PREFIX,
                DEVICE_START_CYCLE_PREFIX,
                DEVICE_END_CYCLE_PREFIX,
            ]
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix))
        })
        .filter_map(|id| id.parse().ok())
        .collect()
}

/// Correlate one device
///
/// **Private** - returns the reason on failure so the caller logs it once
fn correlate_device(
    norm: &NormalizedDump<'_>,
    host_location: &str,
    events: &Map<String, Value>,
    device_id: u32,
) -> Result<ClockParams, String> {
    let parent = parent_path(host_location);
    let device = norm
        .devices
        .iter()
        .find(|(location, info)| {
            parent_path(location) == parent && info.device_id == Some(device_id)
        })
        .map(|(_, info)| info)
        .ok_or_else(|| format!("no device capture location under '{}'", parent))?;

    let runtime_key = format!("{}{}", DEVICE_RUNTIME_PREFIX, device_id);
    let runtime = events
        .get(&runtime_key)
        .ok_or_else(|| format!("missing '{}'", runtime_key))?;
    let runtime_start = first_of(runtime, "start")
        .ok_or_else(|| format!("'{}' has no numeric start", runtime_key))?;
    let runtime_end = first_of(runtime, "end")
        .ok_or_else(|| format!("'{}' has no numeric end", runtime_key))?;

    let start_cycle = aligned_cycle(events, DEVICE_START_CYCLE_PREFIX, device_id)?;
    let end_cycle = aligned_cycle(events, DEVICE_END_CYCLE_PREFIX, device_id)?;

    let runtime_ns = runtime_end - runtime_start;
    if runtime_ns <= 0.0 {
        return Err(format!("non-positive runtime {} ns", runtime_ns));
    }
    let derived_frequency = (end_cycle - start_cycle) / runtime_ns;
    if derived_frequency <= 0.0 {
        return Err(format!(
            "non-positive cycle span {} -> {}",
            start_cycle, end_cycle
        ));
    }

    // Without a usable AICLK the derived clock still stands
    let aiclk_frequency = match device.aiclk_mhz {
        Some(mhz) if mhz > 0.0 => Some(mhz / MHZ_PER_CYCLES_PER_NS),
        Some(mhz) => {
            warn!("{} device {}: ignoring non-positive AICLK {}", host_location, device_id, mhz);
            None
        }
        None => {
            debug!("{} device {}: no AICLK reported", host_location, device_id);
            None
        }
    };

    Ok(ClockParams {
        start_cycle,
        start_ns: runtime_start,
        derived_frequency,
        aiclk_frequency,
    })
}

/// Read a `device-*-cycle-aligned-device-<id>` value
///
/// **Private** - accepts `{ "value": n }`, `{ "start": [n] }` or a bare number
fn aligned_cycle(events: &Map<String, Value>, prefix: &str, device_id: u32) -> Result<f64, String> {
    let key = format!("{}{}", prefix, device_id);
    let event = events.get(&key).ok_or_else(|| format!("missing '{}'", key))?;

    parse_json_f64(event)
        .or_else(|| event.get("value").and_then(parse_json_f64))
        .or_else(|| first_of(event, "start"))
        .ok_or_else(|| format!("'{}' is not numeric", key))
}

/// First numeric element of an array field
///
/// **Private** - internal helper
fn first_of(event: &Value, field: &str) -> Option<f64> {
    event
        .get(field)
        .and_then(number_array)
        .and_then(|values| values.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{normalize, RawDump, Selection};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn dump(host: Value, device_id: u32) -> RawDump {
        dump_with_summary(host, json!({"device-id": device_id, "AICLK": 1000}))
    }

    fn dump_with_summary(host: Value, summary: Value) -> RawDump {
        let mut silicon = BTreeMap::new();
        silicon.insert(
            "run/0000".to_string(),
            json!({ "per-epoch-events": summary }),
        );
        let mut hosts = BTreeMap::new();
        hosts.insert("run/host".to_string(), host);
        RawDump {
            silicon: Some(silicon),
            model: None,
            host: Some(hosts),
            ..Default::default()
        }
    }

    fn host_events() -> Value {
        json!({
            "device-runtime-device-0": {"start": [0], "end": [500], "process-id": "7"},
            "device-start-cycle-aligned-device-0": {"value": 1000},
            "device-end-cycle-aligned-device-0": {"start": [2000]}
        })
    }

    #[test]
    fn test_correlate_clocks() {
        let dump = dump(host_events(), 0);
        let selection = Selection::all(&dump);
        let norm = normalize(&dump, &selection);

        let table = correlate_clocks(&norm);
        let params = table.get("run/host", 0).unwrap();
        assert_eq!(params.derived_frequency, 2.0);
        assert_eq!(params.start_cycle, 1000.0);
        assert_eq!(params.start_ns, 0.0);
        assert_eq!(params.aiclk_frequency, Some(1.0));
        assert!(table.for_device_location("run/0000", 0).is_some());
    }

    #[test]
    fn test_missing_aiclk_keeps_derived_clock() {
        let dump = dump_with_summary(host_events(), json!({"device-id": 0}));
        let selection = Selection::all(&dump);
        let norm = normalize(&dump, &selection);

        let table = correlate_clocks(&norm);
        let params = table.get("run/host", 0).unwrap();
        assert_eq!(params.derived_frequency, 2.0);
        assert_eq!(params.aiclk_frequency, None);
    }

    #[test]
    fn test_device_id_mismatch_aborts_only_that_device() {
        let dump = dump(host_events(), 3);
        let selection = Selection::all(&dump);
        let norm = normalize(&dump, &selection);

        assert!(correlate_clocks(&norm).is_empty());
    }

    #[test]
    fn test_zero_runtime_is_rejected() {
        let host = json!({
            "device-runtime-device-0": {"start": [100], "end": [100]},
            "device-start-cycle-aligned-device-0": {"value": 1000},
            "device-end-cycle-aligned-device-0": {"value": 2000}
        });
        let dump = dump(host, 0);
        let selection = Selection::all(&dump);
        let norm = normalize(&dump, &selection);

        assert!(correlate_clocks(&norm).is_empty());
    }

    #[test]
    fn test_device_ids() {
        let events = json!({
            "device-runtime-device-0": {},
            "device-start-cycle-aligned-device-2": {},
            "device-runtime-device-x": {},
            "compile": {}
        });
        let ids = device_ids(events.as_object().unwrap());
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![0, 2]);
    }
}
