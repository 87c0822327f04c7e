//! Statistics across the per-core instances of an operation.
//!
//! All statistics are computed in raw cycles, before any unit conversion.

use crate::model::{AggregatedOp, BoundLines, CoreOp};
use log::debug;
use std::collections::BTreeMap;

/// Compute bounds, utilization and mean bandwidths for one operation
///
/// **Public** - main entry point for statistics calculation
///
/// Core instances that are out of resource contribute to `low`/`high` only
/// through whichever timestamp they do have, and never to the medians.
pub fn compute_op_stats(op: &mut AggregatedOp) {
    let low = op
        .cores
        .iter()
        .filter_map(CoreOp::start_cycles)
        .reduce(f64::min);
    let high = op
        .cores
        .iter()
        .filter_map(CoreOp::end_cycles)
        .reduce(f64::max);

    let (mut starts, mut ends): (Vec<f64>, Vec<f64>) = op
        .cores
        .iter()
        .filter_map(|core| Some((core.start_cycles()?, core.end_cycles()?)))
        .unzip();

    op.bounds = BoundLines::from_cycles(low, median(&mut starts), median(&mut ends), high);
    op.out_of_resource = low.is_none() || high.is_none();

    op.math_utilization = math_utilization(&op.cores, low, high);
    op.unpack_bandwidth = mean_unpack_bandwidth(&op.cores);
    op.pack_bandwidth = mean(op.cores.iter().filter_map(|c| c.pack_bandwidth));

    debug!(
        "{}: {} cores, bounds {:?}, oor {}",
        op.full_name,
        op.cores.len(),
        op.bounds_cycles(),
        op.out_of_resource
    );
}

/// Conventional median: the middle value, or the mean of the two middle
/// values for an even count
///
/// **Public** - sorts `values` in place
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Arithmetic mean; `None` when empty
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// `activity / (high - low)`, only when every core reports the same activity
///
/// **Private** - internal helper for compute_op_stats
fn math_utilization(cores: &[CoreOp], low: Option<f64>, high: Option<f64>) -> Option<f64> {
    let first = cores.first()?.math_activity?;
    if cores.iter().any(|c| c.math_activity != Some(first)) {
        return None;
    }

    let span = high? - low?;
    (span > 0.0).then(|| first / span)
}

/// Per-operand mean over the cores reporting that operand
///
/// **Private** - internal helper for compute_op_stats
fn mean_unpack_bandwidth(cores: &[CoreOp]) -> BTreeMap<u32, f64> {
    let mut per_operand: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for core in cores {
        for (&operand, &bw) in &core.unpack_bandwidth {
            per_operand.entry(operand).or_default().push(bw);
        }
    }

    per_operand
        .into_iter()
        .filter_map(|(operand, values)| Some((operand, mean(values.into_iter())?)))
        .collect()
}
