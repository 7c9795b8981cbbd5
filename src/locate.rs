//! Coordinate locator
//!
//! Maps genomic coordinates onto leaf indices of a [`RecordSet`] by binary search.

use crate::record::RecordSet;

/// Greatest index `i` with `records[i].position <= x`, or `None` if every sample lies
/// to the right of `x`
#[must_use]
pub fn predecessor_index(records: &RecordSet, x: f64) -> Option<usize> {
    records
        .samples()
        .partition_point(|sample| f64::from(sample.position) <= x)
        .checked_sub(1)
}

/// Where a coordinate falls relative to the sampled domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Left of the first sample
    Before,
    /// Predecessor index of a coordinate inside the domain
    At(usize),
    /// Right of the last sample
    After,
}

/// Classifies `x` against the records of a chromosome
#[must_use]
pub fn locate(records: &RecordSet, x: f64) -> Endpoint {
    match (predecessor_index(records, x), records.domain()) {
        (None, _) | (_, None) => Endpoint::Before,
        (Some(_), Some((_, last))) if x > f64::from(last) => Endpoint::After,
        (Some(index), Some(_)) => Endpoint::At(index),
    }
}

/// Resolves the bin `[left, right]` to an inclusive leaf-index range
///
/// Returns `None` for an empty bin, i.e. one lying entirely before the first sample or
/// entirely after the last. An endpoint outside the sampled domain is clamped: the left
/// one to index 0, the right one to the last index.
///
/// The returned range may be reversed (`lo > hi`) when the bin is narrower than the gap
/// between samples and `right < left`; the tree answers such ranges with 0.
#[must_use]
pub fn leaf_span(records: &RecordSet, left: f64, right: f64) -> Option<(usize, usize)> {
    let last = records.len().checked_sub(1)?;
    match (locate(records, left), locate(records, right)) {
        (Endpoint::Before, Endpoint::After) => Some((0, last)),
        (Endpoint::Before, Endpoint::At(hi)) => Some((0, hi)),
        (Endpoint::At(lo), Endpoint::After) => Some((lo, last)),
        (Endpoint::At(lo), Endpoint::At(hi)) => Some((lo, hi)),
        _ => None,
    }
}
