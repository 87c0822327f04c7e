//! Unit and frequency bases for cycle-valued measurements.
//!
//! Every cycle count in the model is held in a [`Line`] (one value) or a
//! [`Rect`] (a start/end pair). Each caches its value per [`Basis`] the first
//! time the basis is populated and afterwards only re-reads the cache, so
//! switching between bases never accumulates rounding error.
//!
//! Conversion from cycles to nanoseconds:
//! `(cycles - start_cycle) / frequency + start_ns`, with `frequency` in
//! cycles per nanosecond.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Cycles,
    Nanoseconds,
}

/// Clock used for nanosecond conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Measured from host runtime against device cycle counters
    #[default]
    Derived,
    /// Device nominal AICLK
    Aiclk,
}

/// A concrete conversion basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    Cycles,
    DerivedNs,
    AiclkNs,
}

impl Basis {
    pub const ALL: [Basis; 3] = [Basis::Cycles, Basis::DerivedNs, Basis::AiclkNs];

    pub fn from_parts(unit: Unit, frequency: Frequency) -> Self {
        match (unit, frequency) {
            (Unit::Cycles, _) => Basis::Cycles,
            (Unit::Nanoseconds, Frequency::Derived) => Basis::DerivedNs,
            (Unit::Nanoseconds, Frequency::Aiclk) => Basis::AiclkNs,
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            Basis::Cycles => Unit::Cycles,
            Basis::DerivedNs | Basis::AiclkNs => Unit::Nanoseconds,
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Basis::Cycles => write!(f, "cycles"),
            Basis::DerivedNs => write!(f, "ns (derived clock)"),
            Basis::AiclkNs => write!(f, "ns (AICLK)"),
        }
    }
}

/// Device clock parameters derived by clock correlation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockParams {
    /// Device cycle counter at the start of the host-measured runtime
    pub start_cycle: f64,

    /// Host timestamp (ns) of the same instant
    pub start_ns: f64,

    /// Cycles per nanosecond measured over the runtime
    pub derived_frequency: f64,

    /// Cycles per nanosecond from the nominal AICLK, if reported
    pub aiclk_frequency: Option<f64>,
}

impl ClockParams {
    /// Frequency used by a nanosecond basis; `None` for cycles or when unknown
    pub fn frequency(&self, basis: Basis) -> Option<f64> {
        match basis {
            Basis::Cycles => None,
            Basis::DerivedNs => Some(self.derived_frequency),
            Basis::AiclkNs => self.aiclk_frequency,
        }
    }

    /// Convert an absolute cycle timestamp
    pub fn convert_timestamp(&self, cycles: f64, basis: Basis) -> Option<f64> {
        match basis {
            Basis::Cycles => Some(cycles),
            _ => {
                let freq = self.frequency(basis)?;
                Some((cycles - self.start_cycle) * (1.0 / freq) + self.start_ns)
            }
        }
    }

    /// Convert a cycle count that measures a span, not a point in time
    pub fn convert_duration(&self, cycles: f64, basis: Basis) -> Option<f64> {
        match basis {
            Basis::Cycles => Some(cycles),
            _ => Some(cycles / self.frequency(basis)?),
        }
    }
}

/// Bases an entity can be expressed in, given its clock parameters
pub fn registered_bases(clock: Option<&ClockParams>) -> Vec<Basis> {
    Basis::ALL
        .into_iter()
        .filter(|basis| match (basis, clock) {
            (Basis::Cycles, _) => true,
            (_, Some(params)) => params.frequency(*basis).is_some(),
            (_, None) => false,
        })
        .collect()
}

/// Whether a cycle value marks a point in time or a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Timestamp,
    Duration,
}

/// One cycle value plus its cached conversions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    cycles: f64,
    kind: LineKind,
    cache: BTreeMap<Basis, f64>,
    /// Value in the active basis
    pub value: f64,
}

impl Line {
    pub fn timestamp(cycles: f64) -> Self {
        Self::new(cycles, LineKind::Timestamp)
    }

    pub fn duration(cycles: f64) -> Self {
        Self::new(cycles, LineKind::Duration)
    }

    fn new(cycles: f64, kind: LineKind) -> Self {
        let mut cache = BTreeMap::new();
        cache.insert(Basis::Cycles, cycles);
        Self {
            cycles,
            kind,
            cache,
            value: cycles,
        }
    }

    /// Raw cycle value, independent of the active basis
    pub fn cycles(&self) -> f64 {
        self.cycles
    }

    /// Cache every basis the clock supports; already cached bases are kept
    pub fn populate(&mut self, clock: Option<&ClockParams>) {
        let Some(clock) = clock else {
            return;
        };
        for basis in registered_bases(Some(clock)) {
            if self.cache.contains_key(&basis) {
                continue;
            }
            let converted = match self.kind {
                LineKind::Timestamp => clock.convert_timestamp(self.cycles, basis),
                LineKind::Duration => clock.convert_duration(self.cycles, basis),
            };
            if let Some(v) = converted {
                self.cache.insert(basis, v);
            }
        }
    }

    /// Cached value for `basis`
    pub fn get(&self, basis: Basis) -> Option<f64> {
        self.cache.get(&basis).copied()
    }

    /// Copy the cached value for `basis` into `value`; false if not cached
    pub fn switch_to(&mut self, basis: Basis) -> bool {
        match self.get(basis) {
            Some(v) => {
                self.value = v;
                true
            }
            None => false,
        }
    }
}

/// A start/end cycle pair plus cached conversions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    start: Line,
    end: Line,
}

impl Rect {
    pub fn new(start_cycles: f64, end_cycles: f64) -> Self {
        Self {
            start: Line::timestamp(start_cycles),
            end: Line::timestamp(end_cycles),
        }
    }

    pub fn cycles(&self) -> (f64, f64) {
        (self.start.cycles(), self.end.cycles())
    }

    /// Active-basis start and end
    pub fn value(&self) -> (f64, f64) {
        (self.start.value, self.end.value)
    }

    pub fn get(&self, basis: Basis) -> Option<(f64, f64)> {
        Some((self.start.get(basis)?, self.end.get(basis)?))
    }

    pub fn populate(&mut self, clock: Option<&ClockParams>) {
        self.start.populate(clock);
        self.end.populate(clock);
    }

    pub fn switch_to(&mut self, basis: Basis) -> bool {
        // Check both before mutating so a half-switched rect is impossible
        if self.get(basis).is_none() {
            return false;
        }
        self.start.switch_to(basis) && self.end.switch_to(basis)
    }
}

/// Per-entity conversion state: clock inputs plus the applied unit/frequency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub clock: Option<ClockParams>,
    pub unit: Unit,
    pub frequency: Frequency,
    populated: bool,
}

impl UnitState {
    pub fn active(&self) -> Basis {
        Basis::from_parts(self.unit, self.frequency)
    }

    /// Store clock parameters; `None` leaves the state untouched
    pub fn populate_host_info(&mut self, clock: Option<&ClockParams>) {
        if let Some(params) = clock {
            self.clock = Some(*params);
            // New bases may be available now
            self.populated = false;
        }
    }

    pub fn is_registered(&self, basis: Basis) -> bool {
        registered_bases(self.clock.as_ref()).contains(&basis)
    }

    /// Returns true the first time after clock info changes
    pub(crate) fn needs_population(&mut self) -> bool {
        !std::mem::replace(&mut self.populated, true)
    }

    /// Resolve the basis a unit switch would land on, if registered
    pub(crate) fn target_for_unit(&self, unit: Unit) -> Option<Basis> {
        let target = Basis::from_parts(unit, self.frequency);
        self.check(target)
    }

    /// Resolve the basis a frequency switch would land on, if registered
    pub(crate) fn target_for_frequency(&self, frequency: Frequency) -> Option<Basis> {
        let target = Basis::from_parts(self.unit, frequency);
        if self.unit == Unit::Nanoseconds {
            return self.check(target);
        }
        // In cycles only the preference changes; the nominal clock must exist
        // for the later unit switch, checked then.
        Some(target)
    }

    fn check(&self, target: Basis) -> Option<Basis> {
        if self.is_registered(target) {
            Some(target)
        } else {
            debug!("Basis {} not registered for entity", target);
            None
        }
    }
}
