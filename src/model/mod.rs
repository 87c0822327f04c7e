//! The derived timeline model.
//!
//! A [`PerfModel`] owns every aggregated operation and host event built from
//! one raw dump. Capture locations group entities without owning them, and
//! device clock parameters are shared by value.

pub mod entities;
pub mod units;

pub use entities::{
    AggregatedOp, BoundLines, Bounds, CoreOp, HostBox, HostEvent, ModelNumbers, ThreadStage,
    WaitKey, WaitKind,
};
pub use units::{Basis, ClockParams, Frequency, Line, Rect, Unit, UnitState};

use crate::parser::identifier::parent_path;
use log::{info, warn};
use std::collections::BTreeMap;

/// Clock parameters per (host capture location, device id)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockTable {
    entries: BTreeMap<(String, u32), ClockParams>,
}

impl ClockTable {
    pub fn insert(&mut self, host_location: &str, device_id: u32, params: ClockParams) {
        self.entries
            .insert((host_location.to_string(), device_id), params);
    }

    pub fn get(&self, host_location: &str, device_id: u32) -> Option<&ClockParams> {
        self.entries.get(&(host_location.to_string(), device_id))
    }

    /// Parameters for a device location, found through the host location
    /// that shares its parent path
    pub fn for_device_location(&self, location: &str, device_id: u32) -> Option<&ClockParams> {
        let parent = parent_path(location);
        self.entries.iter().find_map(|((host, device), params)| {
            (*device == device_id && parent_path(host) == parent).then_some(params)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a model-wide unit or frequency switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchReport {
    pub switched: usize,
    pub skipped: usize,
}

/// Entity graph for one capture, queryable by location and by `full_name`
#[derive(Debug, Clone, Default)]
pub struct PerfModel {
    ops: BTreeMap<String, AggregatedOp>,
    by_location: BTreeMap<String, Vec<String>>,
    host_events: BTreeMap<String, Vec<HostEvent>>,
    first_input: BTreeMap<String, BTreeMap<String, u32>>,
    clocks: ClockTable,
    unit: Unit,
    frequency: Frequency,
}

impl PerfModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(&self, full_name: &str) -> Option<&AggregatedOp> {
        self.ops.get(full_name)
    }

    pub fn op_mut(&mut self, full_name: &str) -> Option<&mut AggregatedOp> {
        self.ops.get_mut(full_name)
    }

    /// Every aggregated operation, ordered by `full_name`
    pub fn ops(&self) -> impl Iterator<Item = &AggregatedOp> {
        self.ops.values()
    }

    /// Operations of one capture location, in discovery order
    pub fn ops_in<'a>(&'a self, location: &str) -> impl Iterator<Item = &'a AggregatedOp> + 'a {
        self.by_location
            .get(location)
            .into_iter()
            .flatten()
            .filter_map(|name| self.ops.get(name))
    }

    pub fn host_events_in(&self, location: &str) -> &[HostEvent] {
        self.host_events
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn host_events(&self) -> impl Iterator<Item = &HostEvent> {
        self.host_events.values().flatten()
    }

    /// Device locations holding at least one operation
    pub fn device_locations(&self) -> impl Iterator<Item = &str> {
        self.by_location.keys().map(String::as_str)
    }

    pub fn host_locations(&self) -> impl Iterator<Item = &str> {
        self.host_events.keys().map(String::as_str)
    }

    /// Smallest input index recorded for `op_name` in `location`
    pub fn first_input(&self, location: &str, op_name: &str) -> Option<u32> {
        self.first_input.get(location)?.get(op_name).copied()
    }

    pub fn clocks(&self) -> &ClockTable {
        &self.clocks
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.host_events.is_empty()
    }

    /// Cache every registered basis on every entity; idempotent
    pub fn populate_unit_data(&mut self) {
        for op in self.ops.values_mut() {
            op.populate_unit_data();
        }
    }

    /// Switch the active unit of every entity in place.
    ///
    /// Entities without clock parameters for the target stay as they are;
    /// partial data is expected, so this never fails.
    pub fn switch_to_unit(&mut self, unit: Unit) -> SwitchReport {
        let report = self.switch_each(|op| op.switch_to_unit(unit));
        self.unit = unit;
        log_switch(&format!("unit {:?}", unit), report);
        report
    }

    /// Switch the active frequency of every entity in place
    pub fn switch_to_frequency(&mut self, frequency: Frequency) -> SwitchReport {
        let report = self.switch_each(|op| op.switch_to_frequency(frequency));
        self.frequency = frequency;
        log_switch(&format!("frequency {:?}", frequency), report);
        report
    }

    fn switch_each(&mut self, mut f: impl FnMut(&mut AggregatedOp) -> bool) -> SwitchReport {
        let mut report = SwitchReport::default();
        for op in self.ops.values_mut() {
            if f(op) {
                report.switched += 1;
            } else {
                report.skipped += 1;
            }
        }
        report
    }

    /// Insert a new operation, or return the existing one with that name
    pub(crate) fn entry_op(
        &mut self,
        full_name: &str,
        create: impl FnOnce() -> AggregatedOp,
    ) -> &mut AggregatedOp {
        let by_location = &mut self.by_location;
        self.ops.entry(full_name.to_string()).or_insert_with(|| {
            let op = create();
            by_location
                .entry(op.location.clone())
                .or_default()
                .push(full_name.to_string());
            op
        })
    }

    /// Record `input` as the first input of `op_name` if it is the smallest so far
    pub(crate) fn note_input(&mut self, location: &str, op_name: &str, input: u32) {
        let slot = self
            .first_input
            .entry(location.to_string())
            .or_default()
            .entry(op_name.to_string())
            .or_insert(input);
        if input < *slot {
            *slot = input;
        }
    }

    pub(crate) fn push_host_event(&mut self, event: HostEvent) {
        self.host_events
            .entry(event.location.clone())
            .or_default()
            .push(event);
    }

    pub(crate) fn set_clocks(&mut self, clocks: ClockTable) {
        self.clocks = clocks;
    }

    pub(crate) fn ops_mut(&mut self) -> impl Iterator<Item = &mut AggregatedOp> {
        self.ops.values_mut()
    }
}

fn log_switch(target: &str, report: SwitchReport) {
    if report.skipped > 0 {
        warn!(
            "Switched {} operations to {}; {} left unchanged (no clock data)",
            report.switched, target, report.skipped
        );
    } else {
        info!("Switched {} operations to {}", report.switched, target);
    }
}
