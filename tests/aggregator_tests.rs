use perfdump_timeline::aggregator::build_model;
use perfdump_timeline::model::{Basis, Bounds, Frequency, Unit, WaitKind};
use perfdump_timeline::parser::{CoreCoord, RawDump, Selection};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

const MATMUL: &str = "run/0000#matmul0#input-0";

fn source(location: &str, data: Value) -> Option<BTreeMap<String, Value>> {
    Some(BTreeMap::from([(location.to_string(), data)]))
}

fn silicon() -> Value {
    json!({
        "per-epoch-events": {"device-id": 0, "AICLK": 1000},
        "0-0-matmul0": {
            "input-0": {
                "first-unpack-first-block-data-available": 100,
                "last-pack-last-tile-popped": 300,
                "math-activity": 100,
                "trisc-bw-operand-input-0": 8.0,
                "trisc-bw-operand-output-0": 4.0,
                "dram-read-issued": [110, 130]
            },
            "input-1": {
                "first-unpack-first-block-data-available": 400,
                "last-pack-last-tile-popped": 500
            },
            "T0": {
                "wait-for-incoming-tiles-outer-loop-0-operand-1-num-tiles-4": {"start": [10, 20], "end": [15, 18]},
                "wait-for-incoming-tiles-outer-loop-0-operand-0-num-tiles-4": {"start": [10, 20], "end": [15]}
            }
        },
        "1-0-matmul0": {
            "input-0": {
                "first-unpack-first-block-data-available": 120,
                "last-pack-last-tile-popped": 280,
                "math-activity": 100,
                "trisc-bw-operand-input-0": 4.0
            }
        },
        "2-0-matmul0": {
            "input-0": {"math-activity": 100}
        }
    })
}

fn host() -> Value {
    json!({
        "device-runtime-device-0": {"start": [0], "end": [500], "process-id": "7"},
        "device-start-cycle-aligned-device-0": {"value": 0},
        "device-end-cycle-aligned-device-0": {"value": 1000},
        "compile": {"start": [0], "end": [40], "process-id": "7"}
    })
}

fn full_dump() -> RawDump {
    RawDump {
        silicon: source("run/0000", silicon()),
        model: source(
            "run/0000",
            json!({
                "0-0-matmul0": {"input-0": {"model-cycles-per-core": 100, "model-prop-cycles": 200}},
                "0-0-missing0": {"input-0": {"model-cycles-per-core": 5}}
            }),
        ),
        host: source("run/host", host()),
        ..Default::default()
    }
}

#[test]
fn test_matmul_bounds() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));
    let op = model.op(MATMUL).unwrap();

    assert_eq!(
        op.bounds_cycles(),
        Bounds {
            low: Some(100.0),
            med_low: Some(110.0),
            med_high: Some(290.0),
            high: Some(300.0)
        }
    );
    assert_eq!(op.cores.len(), 3);
    assert!(!op.out_of_resource);
    assert_eq!(op.device_id, Some(0));
    assert_eq!(op.graph_id(), Some(0));
    assert_eq!(op.epoch_id(), None);
}

#[test]
fn test_out_of_resource_core() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));
    let op = model.op(MATMUL).unwrap();

    let idle = op
        .cores
        .iter()
        .find(|c| c.core == CoreCoord::new(2, 0))
        .unwrap();
    assert!(idle.out_of_resource);
    assert_eq!(idle.bounds(), Bounds::default());
    // Identical activity on every core, including the idle one
    assert_eq!(op.math_utilization, Some(0.5));
}

#[test]
fn test_full_names_are_unique() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));

    let names: BTreeSet<&str> = model.ops().map(|op| op.full_name.as_str()).collect();
    assert_eq!(names.len(), model.len());
    assert_eq!(
        names.into_iter().collect::<Vec<_>>(),
        vec!["run/0000#matmul0#input-0", "run/0000#matmul0#input-1"]
    );
    assert_eq!(model.first_input("run/0000", "matmul0"), Some(0));
}

#[test]
fn test_wait_intervals() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));
    let core = &model.op(MATMUL).unwrap().cores[0];
    assert_eq!(core.core, CoreCoord::new(0, 0));

    let waits: Vec<_> = core.waits_of(WaitKind::WaitForIncomingTiles).collect();
    // The operand 0 field has mismatched arrays and is dropped
    assert_eq!(waits.len(), 1);
    let (key, rects) = waits[0];
    assert_eq!(key.operand, 1);
    assert_eq!(key.num_tiles, 4);
    assert_eq!(
        rects.iter().map(|r| r.cycles()).collect::<Vec<_>>(),
        vec![(10.0, 15.0), (20.0, 18.0)]
    );
}

#[test]
fn test_metrics_and_markers() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));
    let op = model.op(MATMUL).unwrap();

    assert_eq!(op.unpack_bandwidth, BTreeMap::from([(0, 6.0)]));
    assert_eq!(op.pack_bandwidth, Some(4.0));
    let reads: Vec<f64> = op
        .dram_reads
        .as_ref()
        .unwrap()
        .iter()
        .map(|l| l.cycles())
        .collect();
    assert_eq!(reads, vec![110.0, 130.0]);
    assert!(op.dram_writes.is_none());
}

#[test]
fn test_model_numbers_attach_by_full_name() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));

    let numbers = model.op(MATMUL).unwrap().model.as_ref().unwrap();
    assert_eq!(numbers.cycles_per_core.as_ref().unwrap().cycles(), 100.0);
    assert_eq!(numbers.prop_cycles.as_ref().unwrap().cycles(), 200.0);

    // The unmatched model record is logged and skipped
    assert!(model.op("run/0000#missing0#input-0").is_none());
    assert!(model.op("run/0000#matmul0#input-1").unwrap().model.is_none());
}

#[test]
fn test_model_location_without_silicon_is_skipped() {
    let mut dump = full_dump();
    if let Some(model) = dump.model.as_mut() {
        model.insert(
            "run/0001".to_string(),
            json!({"0-0-matmul0": {"input-0": {"model-cycles-per-core": 1}}}),
        );
    }
    let model = build_model(&dump, &Selection::all(&dump));

    assert_eq!(model.len(), 2);
    assert_eq!(model.ops_in("run/0001").count(), 0);
}

#[test]
fn test_host_events() {
    let dump = full_dump();
    let model = build_model(&dump, &Selection::all(&dump));

    let names: Vec<&str> = model
        .host_events_in("run/host")
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert!(names.contains(&"compile"));
    assert!(names.contains(&"device-runtime-device-0"));
    assert!(!names.iter().any(|n| n.contains("cycle-aligned")));

    let compile = model
        .host_events()
        .find(|e| e.name == "compile")
        .unwrap();
    assert_eq!(compile.process_id(), Some(7));
}

#[test]
fn test_switch_to_nanoseconds() {
    let dump = full_dump();
    let mut model = build_model(&dump, &Selection::all(&dump));
    assert_eq!(model.clocks().len(), 1);

    let report = model.switch_to_unit(Unit::Nanoseconds);
    assert_eq!(report.skipped, 0);

    let op = model.op(MATMUL).unwrap();
    assert_eq!(op.active_basis(), Basis::DerivedNs);
    assert_eq!(
        op.bounds(),
        Bounds {
            low: Some(50.0),
            med_low: Some(55.0),
            med_high: Some(145.0),
            high: Some(150.0)
        }
    );
    // Raw cycles are untouched
    assert_eq!(op.bounds_cycles().low, Some(100.0));

    // Model predictions are durations: no offset
    let numbers = op.model.as_ref().unwrap();
    assert_eq!(numbers.cycles_per_core.as_ref().unwrap().value, 50.0);

    let core = &op.cores[0];
    assert_eq!(core.unit_state().unit, Unit::Nanoseconds);
    let (_, rects) = core.waits_of(WaitKind::WaitForIncomingTiles).next().unwrap();
    assert_eq!(rects[0].value(), (5.0, 7.5));
}

#[test]
fn test_unit_round_trip_is_exact() {
    let dump = full_dump();
    let mut model = build_model(&dump, &Selection::all(&dump));

    model.switch_to_unit(Unit::Nanoseconds);
    let ns = model.op(MATMUL).unwrap().bounds();
    model.switch_to_unit(Unit::Cycles);
    assert_eq!(
        model.op(MATMUL).unwrap().bounds(),
        model.op(MATMUL).unwrap().bounds_cycles()
    );
    model.switch_to_unit(Unit::Nanoseconds);
    assert_eq!(model.op(MATMUL).unwrap().bounds(), ns);
}

#[test]
fn test_aiclk_frequency() {
    let dump = full_dump();
    let mut model = build_model(&dump, &Selection::all(&dump));

    model.switch_to_frequency(Frequency::Aiclk);
    // Still cycles until the unit changes
    assert_eq!(model.op(MATMUL).unwrap().bounds().low, Some(100.0));

    model.switch_to_unit(Unit::Nanoseconds);
    let op = model.op(MATMUL).unwrap();
    assert_eq!(op.active_basis(), Basis::AiclkNs);
    // AICLK 1000 MHz is one cycle per ns
    assert_eq!(op.bounds().low, Some(100.0));
    assert_eq!(op.bounds().high, Some(300.0));
}

#[test]
fn test_switch_without_clock_is_noop() {
    let mut dump = full_dump();
    dump.host = None;
    let mut model = build_model(&dump, &Selection::all(&dump));
    assert!(model.clocks().is_empty());

    let report = model.switch_to_unit(Unit::Nanoseconds);
    assert_eq!(report.switched, 0);
    assert_eq!(report.skipped, model.len());

    let op = model.op(MATMUL).unwrap();
    assert_eq!(op.active_basis(), Basis::Cycles);
    assert_eq!(op.bounds().low, Some(100.0));
}

#[test]
fn test_clock_correlation_example() {
    let dump = RawDump {
        silicon: source(
            "run/epoch_0",
            json!({
                "per-epoch-events": {"device-id": 0, "AICLK": 1200},
                "0-0-op": {"input-0": {
                    "first-unpack-first-block-data-available": 1500,
                    "last-pack-last-tile-popped": 2000
                }}
            }),
        ),
        model: None,
        host: source(
            "run/host",
            json!({
                "device-runtime-device-0": {"start": [0], "end": [500]},
                "device-start-cycle-aligned-device-0": {"value": 1000},
                "device-end-cycle-aligned-device-0": {"value": 2000}
            }),
        ),
        ..Default::default()
    };
    let mut model = build_model(&dump, &Selection::all(&dump));

    let clock = model.clocks().get("run/host", 0).copied().unwrap();
    assert_eq!(clock.derived_frequency, 2.0);

    model.switch_to_unit(Unit::Nanoseconds);
    let op = model.op("run/epoch_0#op#input-0").unwrap();
    assert_eq!(op.epoch_id(), Some(0));
    assert_eq!(op.bounds().low, Some(250.0));
    assert_eq!(op.bounds().high, Some(500.0));
}

/// Two devices under one host folder, each with its own runtime window.
/// Device 1 reports no AICLK.
fn two_device_dump() -> RawDump {
    let op = |start: u64, end: u64| {
        json!({"input-0": {
            "first-unpack-first-block-data-available": start,
            "last-pack-last-tile-popped": end
        }})
    };
    RawDump {
        silicon: Some(BTreeMap::from([
            (
                "run/0000".to_string(),
                json!({"per-epoch-events": {"device-id": 0, "AICLK": 1000}, "0-0-a": op(1500, 2000)}),
            ),
            (
                "run/0001".to_string(),
                json!({"per-epoch-events": {"device-id": 1}, "0-0-b": op(500, 900)}),
            ),
        ])),
        model: None,
        host: source(
            "run/host",
            json!({
                "device-runtime-device-0": {"start": [0], "end": [500]},
                "device-start-cycle-aligned-device-0": {"value": 1000},
                "device-end-cycle-aligned-device-0": {"value": 2000},
                "device-runtime-device-1": {"start": [100], "end": [1100]},
                "device-start-cycle-aligned-device-1": {"value": 0},
                "device-end-cycle-aligned-device-1": {"value": 1000}
            }),
        ),
        ..Default::default()
    }
}

#[test]
fn test_each_device_gets_its_own_clock() {
    let dump = two_device_dump();
    let mut model = build_model(&dump, &Selection::all(&dump));

    let dev0 = model.clocks().get("run/host", 0).copied().unwrap();
    let dev1 = model.clocks().get("run/host", 1).copied().unwrap();
    assert_eq!(dev0.derived_frequency, 2.0);
    assert_eq!(dev1.derived_frequency, 1.0);
    assert_eq!(dev1.start_ns, 100.0);

    let report = model.switch_to_unit(Unit::Nanoseconds);
    assert_eq!(report.skipped, 0);

    // (1500 - 1000) / 2 + 0 and (500 - 0) / 1 + 100
    assert_eq!(model.op("run/0000#a#input-0").unwrap().bounds().low, Some(250.0));
    assert_eq!(model.op("run/0001#b#input-0").unwrap().bounds().low, Some(600.0));
    assert_eq!(model.op("run/0001#b#input-0").unwrap().bounds().high, Some(1000.0));
}

#[test]
fn test_missing_aiclk_keeps_derived_clock_only() {
    let dump = two_device_dump();
    let mut model = build_model(&dump, &Selection::all(&dump));

    assert_eq!(model.clocks().get("run/host", 0).unwrap().aiclk_frequency, Some(1.0));
    assert_eq!(model.clocks().get("run/host", 1).unwrap().aiclk_frequency, None);

    model.switch_to_frequency(Frequency::Aiclk);
    let report = model.switch_to_unit(Unit::Nanoseconds);
    assert_eq!(report.skipped, 1);

    assert_eq!(
        model.op("run/0000#a#input-0").unwrap().active_basis(),
        Basis::AiclkNs
    );
    let b = model.op("run/0001#b#input-0").unwrap();
    assert_eq!(b.active_basis(), Basis::Cycles);
    assert_eq!(b.bounds().low, Some(500.0));
}
