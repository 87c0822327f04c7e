//! Raw record normalization.
//!
//! Walks the three raw sources for the selected capture locations and keeps
//! only records with a parseable identity and an available per-input
//! sub-record. Nothing is copied: the normalized view borrows the dump.

use super::fields::{lookup_number, parse_json_u32, sub_record};
use super::identifier::{
    classify_location, input_key, parse_op_identifier, LocationKind, OpIdentity,
};
use super::schema::{RawDump, Selection};
use crate::utils::config::{AICLK_FIELD, DEVICE_ID_FIELD, PER_EPOCH_EVENTS_KEY};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One (location, operation key, input) triple with its raw sub-records
#[derive(Debug, Clone)]
pub struct OpRecord<'a> {
    pub location: &'a str,
    pub kind: LocationKind,
    pub identity: OpIdentity,
    pub input: u32,

    /// Whole per-core record (holds the `T0`/`T2` stage namespaces)
    pub core_record: &'a Map<String, Value>,

    /// The `input-<n>` sub-record
    pub input_record: &'a Map<String, Value>,
}

/// Device summary read from a location's `per-epoch-events` block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceInfo {
    pub device_id: Option<u32>,
    pub aiclk_mhz: Option<f64>,
}

/// Normalized, borrowed view over a raw dump
#[derive(Debug, Default)]
pub struct NormalizedDump<'a> {
    pub silicon: BTreeMap<&'a str, Vec<OpRecord<'a>>>,
    pub model: BTreeMap<&'a str, Vec<OpRecord<'a>>>,
    pub host: BTreeMap<&'a str, &'a Map<String, Value>>,
    pub devices: BTreeMap<&'a str, DeviceInfo>,
}

impl NormalizedDump<'_> {
    pub fn silicon_record_count(&self) -> usize {
        self.silicon.values().map(Vec::len).sum()
    }
}

/// Normalize the selected part of a raw dump
///
/// **Public** - first stage of every build
///
/// Locations that cannot be classified are skipped with a warning. A
/// location missing from a source is logged and skipped for that source only.
pub fn normalize<'a>(dump: &'a RawDump, selection: &Selection) -> NormalizedDump<'a> {
    let mut out = NormalizedDump::default();

    for location in &selection.locations {
        let kind = classify_location(location);
        match kind {
            LocationKind::Invalid => {
                warn!(
                    "Capture location '{}' is neither graph, epoch nor host; skipping",
                    location
                );
            }
            LocationKind::Host => {
                match source_entry(dump.host.as_ref(), location) {
                    Some((key, data)) => match data.as_object() {
                        Some(events) => {
                            out.host.insert(key, events);
                        }
                        None => warn!("Host data for '{}' is not an object", location),
                    },
                    None => warn!("No host data for capture location '{}'", location),
                }
            }
            LocationKind::Graph(_) | LocationKind::Epoch(_) => {
                match source_entry(dump.silicon.as_ref(), location) {
                    Some((key, data)) => {
                        out.devices.insert(key, read_device_info(data));
                        out.silicon
                            .insert(key, normalize_location(key, kind, data, selection));
                    }
                    None => warn!("No silicon data for capture location '{}'", location),
                }

                match source_entry(dump.model.as_ref(), location) {
                    Some((key, data)) => {
                        out.model
                            .insert(key, normalize_location(key, kind, data, selection));
                    }
                    None => debug!("No model data for capture location '{}'", location),
                }
            }
        }
    }

    debug!(
        "Normalized {} silicon records across {} device locations",
        out.silicon_record_count(),
        out.silicon.len()
    );

    out
}

/// Look up a location in an optional source, borrowing the key from the dump
///
/// **Private** - internal helper for normalize
fn source_entry<'a>(
    source: Option<&'a BTreeMap<String, Value>>,
    location: &str,
) -> Option<(&'a str, &'a Value)> {
    source?
        .get_key_value(location)
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.as_str(), v))
}

/// Keep every (record, input) pair with a valid identity and sub-record
///
/// **Private** - internal helper for normalize
fn normalize_location<'a>(
    location: &'a str,
    kind: LocationKind,
    data: &'a Value,
    selection: &Selection,
) -> Vec<OpRecord<'a>> {
    let Some(records) = data.as_object() else {
        warn!("Data for capture location '{}' is not an object", location);
        return Vec::new();
    };

    let mut out = Vec::new();
    for (key, record) in records {
        let Some(identity) = parse_op_identifier(key) else {
            debug!("Skipping non-operation key '{}' in '{}'", key, location);
            continue;
        };
        let Some(core_record) = record.as_object() else {
            debug!("Record '{}' in '{}' is not an object", key, location);
            continue;
        };

        for &input in &selection.inputs {
            let Some(input_record) = sub_record(core_record, &input_key(input)) else {
                continue;
            };
            out.push(OpRecord {
                location,
                kind,
                identity: identity.clone(),
                input,
                core_record,
                input_record,
            });
        }
    }
    out
}

/// Read device id and nominal clock from the summary block
///
/// **Public** - also used by the clock correlator
pub fn read_device_info(data: &Value) -> DeviceInfo {
    let Some(events) = data
        .as_object()
        .and_then(|obj| sub_record(obj, PER_EPOCH_EVENTS_KEY))
    else {
        return DeviceInfo::default();
    };

    DeviceInfo {
        device_id: events.get(DEVICE_ID_FIELD).and_then(parse_json_u32),
        aiclk_mhz: lookup_number(events, &[AICLK_FIELD]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dump_with(location: &str, data: Value) -> RawDump {
        let mut silicon = BTreeMap::new();
        silicon.insert(location.to_string(), data);
        RawDump {
            silicon: Some(silicon),
            ..Default::default()
        }
    }

    #[test]
    fn test_filters_invalid_keys_and_unavailable_inputs() {
        let dump = dump_with(
            "t/0000",
            json!({
                "per-epoch-events": {"device-id": 1, "AICLK": 1200},
                "0-0-matmul0": {"input-0": {"math-activity": 1}, "input-1": "N/A"},
                "0-1-matmul0": {"input-0": null, "input-1": {}},
                "garbage": {"input-0": {}}
            }),
        );
        let selection = Selection::new(["t/0000".to_string()], [0, 1]);

        let norm = normalize(&dump, &selection);
        let records = &norm.silicon["t/0000"];

        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .any(|r| r.input == 0 && r.identity.core.y == 0));
        assert!(records
            .iter()
            .any(|r| r.input == 1 && r.identity.core.y == 1));
        assert_eq!(
            norm.devices["t/0000"],
            DeviceInfo {
                device_id: Some(1),
                aiclk_mhz: Some(1200.0)
            }
        );
    }

    #[test]
    fn test_missing_location_is_skipped() {
        let dump = dump_with("t/0000", json!({}));
        let selection = Selection::new(["t/0001".to_string(), "t/bogus".to_string()], [0]);

        let norm = normalize(&dump, &selection);
        assert!(norm.silicon.is_empty());
        assert!(norm.host.is_empty());
    }

    #[test]
    fn test_unselected_inputs_are_dropped() {
        let dump = dump_with(
            "t/epoch_0",
            json!({"0-0-op": {"input-0": {}, "input-1": {}}}),
        );
        let selection = Selection::new(["t/epoch_0".to_string()], [1]);

        let norm = normalize(&dump, &selection);
        let records = &norm.silicon["t/epoch_0"];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input, 1);
        assert_eq!(records[0].kind, LocationKind::Epoch(0));
    }
}
