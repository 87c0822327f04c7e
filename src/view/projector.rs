//! Ordered, filtered projections of a built model.
//!
//! Projection only borrows the model; nothing is rebuilt or converted.

use crate::model::{AggregatedOp, CoreOp, HostEvent, PerfModel};
use crate::parser::full_name;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// One row of a projected timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewRow<'a> {
    Op(&'a AggregatedOp),
    /// Per-core instance shown under an expanded operation
    Core(&'a CoreOp),
    Host(&'a HostEvent),
}

/// Rows of one capture location in display order
///
/// **Public** - device locations yield operations, host locations yield events
///
/// Operations are ordered by the raw-cycle finish time of the first-input
/// instance of their name, so every input of one operation stays together.
/// An undefined finish sorts last, ties break on name then input index. Host
/// events are ordered by process id, then finish time.
pub fn sorted_view<'a>(model: &'a PerfModel, location: &str) -> Vec<ViewRow<'a>> {
    let mut ops: Vec<&AggregatedOp> = model.ops_in(location).collect();
    ops.sort_by(|a, b| {
        compare_finish(group_finish(model, a), group_finish(model, b))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.input.cmp(&b.input))
    });

    let mut events: Vec<&HostEvent> = model.host_events_in(location).iter().collect();
    events.sort_by(|a, b| {
        compare_pid(a.process_id(), b.process_id())
            .then_with(|| compare_finish(a.finish(), b.finish()))
            .then_with(|| a.name.cmp(&b.name))
    });

    ops.into_iter()
        .map(ViewRow::Op)
        .chain(events.into_iter().map(ViewRow::Host))
        .collect()
}

/// Concatenated sorted views for a selection
///
/// **Public** - main projection used by reports
///
/// # Arguments
/// * `locations` - Capture locations, emitted in set order
/// * `inputs` - Only operations for these input indices are kept
/// * `expanded` - `full_name`s whose per-core instances follow the operation
pub fn filtered_view<'a>(
    model: &'a PerfModel,
    locations: &BTreeSet<String>,
    inputs: &BTreeSet<u32>,
    expanded: &BTreeSet<String>,
) -> Vec<ViewRow<'a>> {
    let mut rows = Vec::new();

    for location in locations {
        for row in sorted_view(model, location) {
            match row {
                ViewRow::Op(op) => {
                    if !inputs.contains(&op.input) {
                        continue;
                    }
                    rows.push(row);
                    if expanded.contains(&op.full_name) {
                        let mut cores: Vec<&CoreOp> = op.cores.iter().collect();
                        cores.sort_by_key(|c| c.core);
                        rows.extend(cores.into_iter().map(ViewRow::Core));
                    }
                }
                other => rows.push(other),
            }
        }
    }

    rows
}

/// Finish time of the first-input instance of `op`'s name
///
/// **Private** - sort key for sorted_view
fn group_finish(model: &PerfModel, op: &AggregatedOp) -> Option<f64> {
    let first = model.first_input(&op.location, &op.name)?;
    model
        .op(&full_name(&op.location, &op.name, first))?
        .bounds_cycles()
        .high
}

/// Defined values first, ascending
fn compare_finish(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_pid(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
