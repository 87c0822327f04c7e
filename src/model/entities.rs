//! Entity graph: aggregated operations, per-core instances and host events.

use super::units::{Basis, ClockParams, Frequency, Line, Rect, Unit, UnitState};
use crate::parser::{CoreCoord, LocationKind};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Candlestick envelope in the active basis; `None` means undefined
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: Option<f64>,
    pub med_low: Option<f64>,
    pub med_high: Option<f64>,
    pub high: Option<f64>,
}

impl Bounds {
    /// `low <= med_low <= med_high <= high` when all four are defined
    pub fn is_ordered(&self) -> bool {
        match (self.low, self.med_low, self.med_high, self.high) {
            (Some(l), Some(ml), Some(mh), Some(h)) => l <= ml && ml <= mh && mh <= h,
            _ => true,
        }
    }
}

/// Cycle-valued bounds with cached conversions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundLines {
    pub low: Option<Line>,
    pub med_low: Option<Line>,
    pub med_high: Option<Line>,
    pub high: Option<Line>,
}

impl BoundLines {
    pub fn from_cycles(low: Option<f64>, med_low: Option<f64>, med_high: Option<f64>, high: Option<f64>) -> Self {
        Self {
            low: low.map(Line::timestamp),
            med_low: med_low.map(Line::timestamp),
            med_high: med_high.map(Line::timestamp),
            high: high.map(Line::timestamp),
        }
    }

    pub fn view(&self) -> Bounds {
        Bounds {
            low: self.low.as_ref().map(|l| l.value),
            med_low: self.med_low.as_ref().map(|l| l.value),
            med_high: self.med_high.as_ref().map(|l| l.value),
            high: self.high.as_ref().map(|l| l.value),
        }
    }

    pub fn cycles(&self) -> Bounds {
        Bounds {
            low: self.low.as_ref().map(Line::cycles),
            med_low: self.med_low.as_ref().map(Line::cycles),
            med_high: self.med_high.as_ref().map(Line::cycles),
            high: self.high.as_ref().map(Line::cycles),
        }
    }

    fn lines_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        [
            self.low.as_mut(),
            self.med_low.as_mut(),
            self.med_high.as_mut(),
            self.high.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Which wait/stall counter a key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    WaitForIncomingTiles,
    WaitForFreeTiles,
    UnpackStallOnMemory,
    PackStallOnMemory,
}

/// Thread namespace a counter was recorded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStage {
    /// `T0`
    Unpack,
    /// `T2`
    Pack,
}

/// Typed form of a wait/stall field name.
///
/// Field order gives the iteration order: kind, then operand ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaitKey {
    pub kind: WaitKind,
    pub operand: u32,
    pub outer_loop: u32,
    pub num_tiles: u32,
    pub stage: ThreadStage,
}

impl fmt::Display for WaitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}-outer-loop-{}-operand-{}-num-tiles-{}",
            self.kind, self.outer_loop, self.operand, self.num_tiles
        )
    }
}

/// Reference-model predictions for an aggregated operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelNumbers {
    pub cycles_per_core: Option<Line>,
    pub prop_cycles: Option<Line>,
}

impl ModelNumbers {
    fn lines_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        [self.cycles_per_core.as_mut(), self.prop_cycles.as_mut()]
            .into_iter()
            .flatten()
    }
}

/// One operation instance on one core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreOp {
    /// `full_name` of the owning aggregated operation
    pub parent: String,
    pub op_name: String,
    pub core: CoreCoord,
    pub input: u32,

    pub start: Option<Line>,
    pub end: Option<Line>,
    pub out_of_resource: bool,

    pub math_utilization: Option<f64>,
    pub math_activity: Option<f64>,
    /// Unpack bandwidth keyed by operand index
    pub unpack_bandwidth: BTreeMap<u32, f64>,
    pub pack_bandwidth: Option<f64>,

    pub waits: BTreeMap<WaitKey, Vec<Rect>>,

    pub(crate) units: UnitState,
}

impl CoreOp {
    pub fn new(parent: String, op_name: String, core: CoreCoord, input: u32) -> Self {
        Self {
            parent,
            op_name,
            core,
            input,
            start: None,
            end: None,
            out_of_resource: true,
            math_utilization: None,
            math_activity: None,
            unpack_bandwidth: BTreeMap::new(),
            pack_bandwidth: None,
            waits: BTreeMap::new(),
            units: UnitState::default(),
        }
    }

    /// Set both timestamps and derive the out-of-resource flag
    pub fn set_times(&mut self, start: Option<f64>, end: Option<f64>) {
        self.start = start.map(Line::timestamp);
        self.end = end.map(Line::timestamp);
        self.out_of_resource = self.start.is_none() || self.end.is_none();
    }

    /// Bounds at single-core granularity: `(start, start, end, end)`
    pub fn bounds(&self) -> Bounds {
        let start = self.start.as_ref().map(|l| l.value);
        let end = self.end.as_ref().map(|l| l.value);
        Bounds {
            low: start,
            med_low: start,
            med_high: end,
            high: end,
        }
    }

    pub fn start_cycles(&self) -> Option<f64> {
        self.start.as_ref().map(Line::cycles)
    }

    pub fn end_cycles(&self) -> Option<f64> {
        self.end.as_ref().map(Line::cycles)
    }

    /// Intervals of one kind, ordered by operand index
    pub fn waits_of(&self, kind: WaitKind) -> impl Iterator<Item = (&WaitKey, &Vec<Rect>)> {
        self.waits.iter().filter(move |(key, _)| key.kind == kind)
    }

    pub fn unit_state(&self) -> &UnitState {
        &self.units
    }

    pub fn populate_host_info(&mut self, clock: Option<&ClockParams>) {
        self.units.populate_host_info(clock);
    }

    pub fn populate_unit_data(&mut self) {
        if !self.units.needs_population() {
            return;
        }
        let clock = self.units.clock;
        for line in self.start.iter_mut().chain(self.end.iter_mut()) {
            line.populate(clock.as_ref());
        }
        for rect in self.waits.values_mut().flatten() {
            rect.populate(clock.as_ref());
        }
    }

    pub fn switch_to_unit(&mut self, unit: Unit) -> bool {
        match self.units.target_for_unit(unit) {
            Some(basis) => {
                self.apply(basis);
                self.units.unit = unit;
                true
            }
            None => false,
        }
    }

    pub fn switch_to_frequency(&mut self, frequency: Frequency) -> bool {
        match self.units.target_for_frequency(frequency) {
            Some(basis) => {
                self.apply(basis);
                self.units.frequency = frequency;
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, basis: Basis) {
        self.populate_unit_data();
        for line in self.start.iter_mut().chain(self.end.iter_mut()) {
            line.switch_to(basis);
        }
        for rect in self.waits.values_mut().flatten() {
            rect.switch_to(basis);
        }
    }
}

/// One operation for one input, unified across every core it ran on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedOp {
    pub full_name: String,
    pub name: String,
    pub location: String,
    pub input: u32,
    /// Graph- or epoch-addressed; never both
    pub address: LocationKind,
    pub device_id: Option<u32>,

    pub cores: Vec<CoreOp>,
    pub model: Option<ModelNumbers>,

    pub out_of_resource: bool,
    pub math_utilization: Option<f64>,
    /// Mean unpack bandwidth per operand over reporting cores
    pub unpack_bandwidth: BTreeMap<u32, f64>,
    /// Mean pack bandwidth over reporting cores
    pub pack_bandwidth: Option<f64>,

    /// `None` when no such events were recorded
    pub dram_reads: Option<Vec<Line>>,
    pub dram_writes: Option<Vec<Line>>,

    pub(crate) bounds: BoundLines,
    pub(crate) units: UnitState,
}

impl AggregatedOp {
    pub fn new(full_name: String, name: String, location: String, input: u32, address: LocationKind) -> Self {
        Self {
            full_name,
            name,
            location,
            input,
            address,
            device_id: None,
            cores: Vec::new(),
            model: None,
            out_of_resource: true,
            math_utilization: None,
            unpack_bandwidth: BTreeMap::new(),
            pack_bandwidth: None,
            dram_reads: None,
            dram_writes: None,
            bounds: BoundLines::default(),
            units: UnitState::default(),
        }
    }

    pub fn graph_id(&self) -> Option<u32> {
        self.address.graph_id()
    }

    pub fn epoch_id(&self) -> Option<u32> {
        self.address.epoch_id()
    }

    /// Bounds in the active basis
    pub fn bounds(&self) -> Bounds {
        self.bounds.view()
    }

    /// Bounds in raw cycles, regardless of the active basis
    pub fn bounds_cycles(&self) -> Bounds {
        self.bounds.cycles()
    }

    pub fn unit_state(&self) -> &UnitState {
        &self.units
    }

    pub fn active_basis(&self) -> Basis {
        self.units.active()
    }

    /// Store clock parameters on the operation and every core
    pub fn populate_host_info(&mut self, clock: Option<&ClockParams>) {
        self.units.populate_host_info(clock);
        for core in &mut self.cores {
            core.populate_host_info(clock);
        }
    }

    /// Compute and cache every registered basis; idempotent
    pub fn populate_unit_data(&mut self) {
        if self.units.needs_population() {
            let clock = self.units.clock;
            for line in self.lines_mut() {
                line.populate(clock.as_ref());
            }
        }
        for core in &mut self.cores {
            core.populate_unit_data();
        }
    }

    /// Switch to `unit` keeping the current frequency; no-op if unregistered
    pub fn switch_to_unit(&mut self, unit: Unit) -> bool {
        let Some(basis) = self.units.target_for_unit(unit) else {
            debug!("{}: cannot switch to {:?}, clock unknown", self.full_name, unit);
            return false;
        };
        self.apply(basis);
        self.units.unit = unit;
        for core in &mut self.cores {
            core.switch_to_unit(unit);
        }
        true
    }

    /// Switch to `frequency` keeping the current unit; no-op if unregistered
    pub fn switch_to_frequency(&mut self, frequency: Frequency) -> bool {
        let Some(basis) = self.units.target_for_frequency(frequency) else {
            debug!(
                "{}: cannot switch to {:?} frequency, clock unknown",
                self.full_name, frequency
            );
            return false;
        };
        self.apply(basis);
        self.units.frequency = frequency;
        for core in &mut self.cores {
            core.switch_to_frequency(frequency);
        }
        true
    }

    fn apply(&mut self, basis: Basis) {
        self.populate_unit_data();
        for line in self.lines_mut() {
            line.switch_to(basis);
        }
    }

    fn lines_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        let markers = self
            .dram_reads
            .iter_mut()
            .chain(self.dram_writes.iter_mut())
            .flatten();
        let model = self.model.iter_mut().flat_map(|m| m.lines_mut());
        self.bounds.lines_mut().chain(markers).chain(model)
    }
}

/// One host-side time box, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostBox {
    pub low: f64,
    pub high: f64,
    pub process_id: Option<u32>,
}

/// A named host-process activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    pub name: String,
    pub location: String,
    pub boxes: Vec<HostBox>,
}

impl HostEvent {
    pub fn process_id(&self) -> Option<u32> {
        self.boxes.iter().find_map(|b| b.process_id)
    }

    /// Latest box end
    pub fn finish(&self) -> Option<f64> {
        self.boxes.iter().map(|b| b.high).reduce(f64::max)
    }

    pub fn start(&self) -> Option<f64> {
        self.boxes.iter().map(|b| b.low).reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_op_out_of_resource() {
        let mut core = CoreOp::new("p".into(), "op".into(), CoreCoord::new(0, 0), 0);
        core.set_times(Some(1.0), None);
        assert!(core.out_of_resource);
        core.set_times(Some(1.0), Some(2.0));
        assert!(!core.out_of_resource);
        assert_eq!(
            core.bounds(),
            Bounds {
                low: Some(1.0),
                med_low: Some(1.0),
                med_high: Some(2.0),
                high: Some(2.0)
            }
        );
    }

    #[test]
    fn test_wait_key_orders_by_operand_within_kind() {
        let a = WaitKey {
            kind: WaitKind::WaitForIncomingTiles,
            operand: 0,
            outer_loop: 3,
            num_tiles: 8,
            stage: ThreadStage::Pack,
        };
        let b = WaitKey {
            operand: 1,
            outer_loop: 0,
            num_tiles: 1,
            stage: ThreadStage::Unpack,
            ..a
        };
        assert!(a < b);
    }

    #[test]
    fn test_bounds_is_ordered() {
        let b = Bounds {
            low: Some(1.0),
            med_low: Some(3.0),
            med_high: Some(2.0),
            high: Some(4.0),
        };
        assert!(!b.is_ordered());
        assert!(Bounds::default().is_ordered());
    }

    #[test]
    fn test_host_event_finish() {
        let ev = HostEvent {
            name: "run".into(),
            location: "t/host".into(),
            boxes: vec![
                HostBox { low: 5.0, high: 9.0, process_id: Some(7) },
                HostBox { low: 1.0, high: 3.0, process_id: Some(7) },
            ],
        };
        assert_eq!(ev.finish(), Some(9.0));
        assert_eq!(ev.start(), Some(1.0));
        assert_eq!(ev.process_id(), Some(7));
    }
}
