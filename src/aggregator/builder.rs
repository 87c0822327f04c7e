//! Build the timeline model from a raw dump.
//!
//! Pipeline: normalize -> core instances and aggregated operations ->
//! model predictions -> host events -> clock correlation -> statistics ->
//! unit caches.

use super::clock::correlate_clocks;
use super::stats::compute_op_stats;
use super::waits::extract_waits;
use crate::model::{AggregatedOp, CoreOp, HostBox, HostEvent, Line, ModelNumbers, PerfModel};
use crate::parser::fields::{lookup_number, number_array, parse_json_f64, parse_json_u32};
use crate::parser::{full_name, normalize, NormalizedDump, OpRecord, RawDump, Selection};
use crate::utils::config::{
    DEVICE_END_CYCLE_PREFIX, DEVICE_RUNTIME_PREFIX, DEVICE_START_CYCLE_PREFIX, DRAM_READ_FIELD,
    DRAM_WRITE_FIELD, END_FIELD_NAMES, MATH_ACTIVITY_FIELD_NAMES, MATH_UTILIZATION_FIELD_NAMES,
    MODEL_CYCLES_FIELD_NAMES, MODEL_PROP_CYCLES_FIELD_NAMES, PACK_BW_FIELD_NAMES,
    PROCESS_ID_FIELD, START_FIELD_NAMES, UNPACK_BW_PREFIX,
};
use crate::utils::BuildError;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Build the full entity graph for the selected part of a dump
///
/// **Public** - main entry point for model building
///
/// # Arguments
/// * `dump` - Raw silicon, model and host records
/// * `selection` - Capture locations and input indices to include
///
/// # Returns
/// A fully populated model in cycles. Per-record problems are logged and
/// skipped; building never fails as a whole.
pub fn build_model(dump: &RawDump, selection: &Selection) -> PerfModel {
    info!(
        "Building model for {} locations, {} inputs",
        selection.locations.len(),
        selection.inputs.len()
    );

    let norm = normalize(dump, selection);
    let mut model = PerfModel::new();

    add_silicon_records(&mut model, &norm);
    attach_model_numbers(&mut model, &norm);
    add_host_events(&mut model, &norm);

    let clocks = correlate_clocks(&norm);
    for op in model.ops_mut() {
        let clock = op
            .device_id
            .and_then(|id| clocks.for_device_location(&op.location, id))
            .copied();
        if clock.is_none() {
            debug!("{}: no clock parameters, cycles only", op.full_name);
        }
        op.populate_host_info(clock.as_ref());
    }
    model.set_clocks(clocks);

    for op in model.ops_mut() {
        compute_op_stats(op);
    }
    model.populate_unit_data();

    info!(
        "Built {} operations and {} host events",
        model.len(),
        model.host_events().count()
    );
    model
}

/// First pass: one CoreOp per record, grouped under its AggregatedOp
///
/// **Private** - internal helper for build_model
fn add_silicon_records(model: &mut PerfModel, norm: &NormalizedDump<'_>) {
    for (&location, records) in &norm.silicon {
        let device_id = norm.devices.get(location).and_then(|d| d.device_id);
        if device_id.is_none() {
            warn!("No device id for capture location '{}'", location);
        }

        for record in records {
            let name = full_name(location, &record.identity.name, record.input);
            let core = build_core_op(record, &name);

            let op = model.entry_op(&name, || {
                let mut op = AggregatedOp::new(
                    name.clone(),
                    record.identity.name.clone(),
                    location.to_string(),
                    record.input,
                    record.kind,
                );
                op.device_id = device_id;
                op
            });
            append_markers(op, record.input_record, &name);
            op.cores.push(core);

            model.note_input(location, &record.identity.name, record.input);
        }
    }
}

/// Build one per-core instance from its input sub-record
///
/// **Private** - internal helper for add_silicon_records
fn build_core_op(record: &OpRecord<'_>, parent: &str) -> CoreOp {
    let fields = record.input_record;
    let mut core = CoreOp::new(
        parent.to_string(),
        record.identity.name.clone(),
        record.identity.core,
        record.input,
    );

    let start = lookup_number(fields, START_FIELD_NAMES);
    let end = lookup_number(fields, END_FIELD_NAMES);
    match (start, end) {
        (Some(s), Some(e)) if s > e => {
            warn!(
                "{} core {}: start {} after end {}, treating as out of resource",
                parent, record.identity.core, s, e
            );
            core.set_times(None, None);
        }
        _ => core.set_times(start, end),
    }
    if core.out_of_resource {
        debug!("{} core {}: missing start or end", parent, record.identity.core);
    }

    core.math_utilization = lookup_number(fields, MATH_UTILIZATION_FIELD_NAMES);
    core.math_activity = lookup_number(fields, MATH_ACTIVITY_FIELD_NAMES);
    core.unpack_bandwidth = unpack_bandwidth(fields);
    core.pack_bandwidth = lookup_number(fields, PACK_BW_FIELD_NAMES);

    let label = format!("{} core {}", parent, record.identity.core);
    core.waits = extract_waits(record.core_record, record.input, &label);

    core
}

/// `trisc-bw-operand-input-<n>` fields keyed by operand
///
/// **Private** - internal helper for build_core_op
fn unpack_bandwidth(fields: &Map<String, Value>) -> BTreeMap<u32, f64> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            let operand = key.strip_prefix(UNPACK_BW_PREFIX)?.parse().ok()?;
            Some((operand, parse_json_f64(value)?))
        })
        .collect()
}

/// Append DRAM read/write markers to the parent operation
///
/// **Private** - internal helper for add_silicon_records
fn append_markers(op: &mut AggregatedOp, fields: &Map<String, Value>, label: &str) {
    for (field, target) in [
        (DRAM_READ_FIELD, &mut op.dram_reads),
        (DRAM_WRITE_FIELD, &mut op.dram_writes),
    ] {
        let Some(raw) = fields.get(field) else {
            continue;
        };
        match number_array(raw) {
            Some(values) => target
                .get_or_insert_with(Vec::new)
                .extend(values.into_iter().map(Line::timestamp)),
            None => warn!("{}: '{}' is not a numeric array", label, field),
        }
    }
}

/// Second pass: attach reference-model predictions by `full_name`
///
/// **Private** - internal helper for build_model
fn attach_model_numbers(model: &mut PerfModel, norm: &NormalizedDump<'_>) {
    for (&location, records) in &norm.model {
        if let Err(e) = check_silicon_location(norm, location) {
            error!("{}", e);
            continue;
        }

        for record in records {
            let name = full_name(location, &record.identity.name, record.input);
            let Some(op) = model.op_mut(&name) else {
                error!("Model record '{}' has no matching silicon operation", name);
                continue;
            };
            // Predictions are per operation; the first core record wins
            if op.model.is_some() {
                continue;
            }

            let fields = record.input_record;
            op.model = Some(ModelNumbers {
                cycles_per_core: lookup_number(fields, MODEL_CYCLES_FIELD_NAMES)
                    .map(Line::duration),
                prop_cycles: lookup_number(fields, MODEL_PROP_CYCLES_FIELD_NAMES)
                    .map(Line::duration),
            });
        }
    }
}

/// Model data must refer to a location that silicon data also has
///
/// **Private** - lookup site for the only structural violation
fn check_silicon_location(norm: &NormalizedDump<'_>, location: &str) -> Result<(), BuildError> {
    if norm.silicon.contains_key(location) {
        Ok(())
    } else {
        Err(BuildError::MissingLocation(location.to_string()))
    }
}

/// Host events from `{ start: [..], end: [..], process-id }` records
///
/// **Private** - internal helper for build_model
fn add_host_events(model: &mut PerfModel, norm: &NormalizedDump<'_>) {
    for (&location, events) in &norm.host {
        for (name, value) in events.iter() {
            if is_device_clock_field(name) && value.get("end").is_none() {
                continue;
            }
            if let Some(event) = build_host_event(location, name, value) {
                model.push_host_event(event);
            }
        }
    }
}

/// **Private** - internal helper for add_host_events
fn build_host_event(location: &str, name: &str, value: &Value) -> Option<HostEvent> {
    let starts = value.get("start").and_then(number_array);
    let ends = value.get("end").and_then(number_array);
    let (Some(starts), Some(ends)) = (starts, ends) else {
        debug!("Host field '{}' in '{}' is not an event", name, location);
        return None;
    };
    if starts.len() != ends.len() {
        warn!(
            "Host event '{}' in '{}': {} starts but {} ends; skipping",
            name,
            location,
            starts.len(),
            ends.len()
        );
        return None;
    }

    let process_id = value.get(PROCESS_ID_FIELD).and_then(parse_json_u32);
    let boxes: Vec<HostBox> = starts
        .into_iter()
        .zip(ends)
        .filter_map(|(low, high)| {
            if low > high {
                warn!(
                    "Host event '{}' in '{}': box {} > {} dropped",
                    name, location, low, high
                );
                return None;
            }
            Some(HostBox {
                low,
                high,
                process_id,
            })
        })
        .collect();

    if boxes.is_empty() {
        return None;
    }
    Some(HostEvent {
        name: name.to_string(),
        location: location.to_string(),
        boxes,
    })
}

fn is_device_clock_field(name: &str) -> bool {
    [
        DEVICE_RUNTIME_PREFIX,
        DEVICE_START_CYCLE_PREFIX,
        DEVICE_END_CYCLE_PREFIX,
    ]
    .iter()
    .any(|prefix| name.starts_with(prefix))
}
