//! Serializable timeline report.
//!
//! A report is a flattened, display-ordered snapshot of a filtered view in
//! the model's active unit. It carries no cache state and can be read back
//! for validation.

use crate::model::{
    AggregatedOp, Basis, Bounds, CoreOp, Frequency, HostBox, HostEvent, Line, PerfModel,
    ThreadStage, Unit, WaitKind,
};
use crate::parser::{CoreCoord, Selection};
use crate::utils::config::SCHEMA_VERSION;
use crate::view::{filtered_view, ViewRow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Top-level report document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineReport {
    /// Report schema version
    pub version: String,

    /// RFC 3339 creation time
    pub generated_at: String,

    /// Requested unit and frequency. Operations without clock data stay in
    /// cycles, so each row's `basis` is authoritative for its values.
    pub unit: Unit,
    pub frequency: Frequency,

    /// Operation rows left in a basis other than the requested one
    #[serde(default)]
    pub unconverted_ops: usize,

    pub locations: Vec<String>,
    pub inputs: Vec<u32>,

    pub rows: Vec<ReportRow>,
}

impl TimelineReport {
    pub fn op_rows(&self) -> impl Iterator<Item = &OpRow> {
        self.rows.iter().filter_map(|row| match row {
            ReportRow::Op(op) => Some(op),
            _ => None,
        })
    }

    pub fn host_rows(&self) -> impl Iterator<Item = &HostRow> {
        self.rows.iter().filter_map(|row| match row {
            ReportRow::Host(host) => Some(host),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportRow {
    Op(OpRow),
    Core(CoreRow),
    Host(HostRow),
}

/// One aggregated operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpRow {
    pub full_name: String,
    pub name: String,
    pub location: String,
    pub input: u32,
    pub graph_id: Option<u32>,
    pub epoch_id: Option<u32>,
    pub device_id: Option<u32>,

    /// Basis the values below are expressed in
    pub basis: Basis,
    pub bounds: Bounds,
    pub out_of_resource: bool,
    pub core_count: usize,

    pub math_utilization: Option<f64>,
    pub unpack_bandwidth: BTreeMap<u32, f64>,
    pub pack_bandwidth: Option<f64>,

    pub model_cycles_per_core: Option<f64>,
    pub model_prop_cycles: Option<f64>,

    pub dram_reads: Option<Vec<f64>>,
    pub dram_writes: Option<Vec<f64>>,
}

/// One per-core instance of an expanded operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreRow {
    pub parent: String,
    pub core: CoreCoord,
    pub input: u32,
    pub basis: Basis,
    pub bounds: Bounds,
    pub out_of_resource: bool,
    pub math_utilization: Option<f64>,
    pub math_activity: Option<f64>,
    pub unpack_bandwidth: BTreeMap<u32, f64>,
    pub pack_bandwidth: Option<f64>,
    pub waits: Vec<WaitRow>,
}

/// One wait/stall interval sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitRow {
    pub kind: WaitKind,
    pub stage: ThreadStage,
    pub operand: u32,
    pub num_tiles: u32,
    /// `(start, end)` pairs in the active basis
    pub intervals: Vec<(f64, f64)>,
}

/// One host event; always nanoseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRow {
    pub name: String,
    pub location: String,
    pub process_id: Option<u32>,
    pub boxes: Vec<HostBox>,
}

/// Snapshot the filtered view of `model` as a report
///
/// **Public** - main entry point for report construction
///
/// # Arguments
/// * `model` - Built model; values are taken in its active basis
/// * `selection` - Locations and inputs to include
/// * `expanded` - `full_name`s whose per-core rows are included
pub fn build_report(
    model: &PerfModel,
    selection: &Selection,
    expanded: &BTreeSet<String>,
) -> TimelineReport {
    let rows = filtered_view(model, &selection.locations, &selection.inputs, expanded)
        .into_iter()
        .map(|row| match row {
            ViewRow::Op(op) => ReportRow::Op(op_row(op)),
            ViewRow::Core(core) => ReportRow::Core(core_row(core)),
            ViewRow::Host(event) => ReportRow::Host(host_row(event)),
        })
        .collect::<Vec<_>>();

    let requested = Basis::from_parts(model.unit(), model.frequency());
    let unconverted_ops = rows
        .iter()
        .filter(|row| matches!(row, ReportRow::Op(op) if op.basis != requested))
        .count();

    TimelineReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        unit: model.unit(),
        frequency: model.frequency(),
        unconverted_ops,
        locations: selection.locations.iter().cloned().collect(),
        inputs: selection.inputs.iter().copied().collect(),
        rows,
    }
}

fn op_row(op: &AggregatedOp) -> OpRow {
    let model = op.model.as_ref();

    OpRow {
        full_name: op.full_name.clone(),
        name: op.name.clone(),
        location: op.location.clone(),
        input: op.input,
        graph_id: op.graph_id(),
        epoch_id: op.epoch_id(),
        device_id: op.device_id,
        basis: op.active_basis(),
        bounds: op.bounds(),
        out_of_resource: op.out_of_resource,
        core_count: op.cores.len(),
        math_utilization: op.math_utilization,
        unpack_bandwidth: op.unpack_bandwidth.clone(),
        pack_bandwidth: op.pack_bandwidth,
        model_cycles_per_core: model
            .and_then(|m| m.cycles_per_core.as_ref())
            .map(|l| l.value),
        model_prop_cycles: model.and_then(|m| m.prop_cycles.as_ref()).map(|l| l.value),
        dram_reads: markers(&op.dram_reads),
        dram_writes: markers(&op.dram_writes),
    }
}

fn markers(lines: &Option<Vec<Line>>) -> Option<Vec<f64>> {
    lines
        .as_ref()
        .map(|lines| lines.iter().map(|l| l.value).collect())
}

fn core_row(core: &CoreOp) -> CoreRow {
    CoreRow {
        parent: core.parent.clone(),
        core: core.core,
        input: core.input,
        basis: core.unit_state().active(),
        bounds: core.bounds(),
        out_of_resource: core.out_of_resource,
        math_utilization: core.math_utilization,
        math_activity: core.math_activity,
        unpack_bandwidth: core.unpack_bandwidth.clone(),
        pack_bandwidth: core.pack_bandwidth,
        waits: core
            .waits
            .iter()
            .map(|(key, rects)| WaitRow {
                kind: key.kind,
                stage: key.stage,
                operand: key.operand,
                num_tiles: key.num_tiles,
                intervals: rects.iter().map(|r| r.value()).collect(),
            })
            .collect(),
    }
}

fn host_row(event: &HostEvent) -> HostRow {
    HostRow {
        name: event.name.clone(),
        location: event.location.clone(),
        process_id: event.process_id(),
        boxes: event.boxes.clone(),
    }
}

/// Plain-text table of the first `max_rows` operations
///
/// **Public** - printed by `build --summary`
pub fn generate_text_summary(report: &TimelineReport, max_rows: usize) -> String {
    let unit = match report.unit {
        Unit::Cycles => "cycles",
        Unit::Nanoseconds => "ns",
    };
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v));

    let mut lines = Vec::new();
    lines.push(format!(
        "  {:<40} {:>6} {:>14} {:>14} {:>6} {:>4}",
        "OPERATION",
        "INPUT",
        format!("START ({})", unit),
        format!("END ({})", unit),
        "CORES",
        "OOR"
    ));
    lines.push(format!("  {}", "-".repeat(89)));

    for op in report.op_rows().take(max_rows) {
        let chars = op.name.chars().count();
        let name = if chars > 40 {
            let tail: String = op.name.chars().skip(chars - 37).collect();
            format!("...{}", tail)
        } else {
            op.name.clone()
        };
        lines.push(format!(
            "  {:<40} {:>6} {:>14} {:>14} {:>6} {:>4}",
            name,
            op.input,
            fmt(op.bounds.low),
            fmt(op.bounds.high),
            op.core_count,
            if op.out_of_resource { "yes" } else { "" }
        ));
    }

    let total = report.op_rows().count();
    if total > max_rows {
        lines.push(format!("  ... {} more operations", total - max_rows));
    }
    lines.push(format!("  {} host events", report.host_rows().count()));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(rows: Vec<ReportRow>) -> TimelineReport {
        TimelineReport {
            version: SCHEMA_VERSION.to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
            unit: Unit::Cycles,
            frequency: Frequency::Derived,
            unconverted_ops: 0,
            locations: vec![],
            inputs: vec![0],
            rows,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = generate_text_summary(&report_with(vec![]), 10);
        assert!(summary.contains("OPERATION"));
        assert!(summary.contains("0 host events"));
    }

    #[test]
    fn test_unconverted_ops_are_counted() {
        use crate::aggregator::build_model;
        use crate::parser::RawDump;
        use serde_json::json;

        // No host data, so no clock: a nanosecond switch leaves ops in cycles
        let dump = RawDump {
            silicon: Some(BTreeMap::from([(
                "t/0000".to_string(),
                json!({
                    "per-epoch-events": {"device-id": 0},
                    "0-0-a": {"input-0": {
                        "first-unpack-first-block-data-available": 1,
                        "last-pack-last-tile-popped": 2
                    }}
                }),
            )])),
            ..Default::default()
        };
        let selection = Selection::all(&dump);
        let mut model = build_model(&dump, &selection);
        model.switch_to_unit(Unit::Nanoseconds);

        let report = build_report(&model, &selection, &BTreeSet::new());
        assert_eq!(report.unit, Unit::Nanoseconds);
        assert_eq!(report.unconverted_ops, 1);
        assert_eq!(report.op_rows().next().unwrap().basis, Basis::Cycles);
    }

    #[test]
    fn test_row_tagging() {
        let row = ReportRow::Host(HostRow {
            name: "compile".into(),
            location: "t/host".into(),
            process_id: Some(3),
            boxes: vec![],
        });
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "host");
        assert_eq!(json["process_id"], 3);
    }
}
