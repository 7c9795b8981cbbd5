//! Bounding a motif list to a renderable number of items
//!
//! When a query window holds more than `K` motifs, every motif's end is extended by a
//! radius `e` and the list is merged left to right into runs. The run count is
//! non-increasing in `e`, so the smallest radius yielding at most `K` runs is found by
//! binary search in `O(n log span)`.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{read_motifs, AggregatedMotif, Motif};
use crate::error::Result;

/// Default maximum number of motifs returned without aggregation
pub const DEFAULT_THRESHOLD: usize = 200;

/// Configuration of an [`Aggregator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateConfig {
    /// Largest number of items a query may return (values below 1 are treated as 1)
    pub threshold: usize,
}
impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}
impl AggregateConfig {
    #[must_use]
    pub fn with_threshold(threshold: usize) -> Self {
        Self { threshold }
    }
}

/// Result of an aggregation query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// The window held few enough motifs to be returned as-is
    Raw(Vec<Motif>),
    /// The window was merged into runs at the given extension radius
    Merged {
        extension: i64,
        runs: Vec<AggregatedMotif>,
    },
}
impl Aggregation {
    #[must_use]
    pub fn is_aggregated(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(motifs) => motifs.len(),
            Self::Merged { runs, .. } => runs.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Motifs intersecting `[start, end]`, in input order
///
/// Missing bounds are unbounded. The scan stops at the first motif starting past `end`,
/// which is only correct because the input is sorted by start.
#[must_use]
pub fn filter_range(motifs: &[Motif], start: Option<i64>, end: Option<i64>) -> Vec<Motif> {
    let start = start.unwrap_or(i64::MIN);
    let end = end.unwrap_or(i64::MAX);
    motifs
        .iter()
        .take_while(|motif| motif.start <= end)
        .filter(|motif| motif.overlaps(start, end))
        .cloned()
        .collect()
}

/// Merges motifs into runs after extending each end by `extension`
///
/// A motif joins the current run when it starts at or before the run's extended end.
/// Reported runs keep their unextended ends.
#[must_use]
pub fn merge_runs(motifs: &[Motif], extension: i64) -> Vec<AggregatedMotif> {
    let mut runs: Vec<AggregatedMotif> = Vec::new();
    let mut reach = i64::MIN;
    for motif in motifs {
        match runs.last_mut() {
            Some(run) if motif.start <= reach => {
                run.end = run.end.max(motif.end);
                reach = reach.max(motif.end.saturating_add(extension));
            }
            _ => {
                runs.push(AggregatedMotif {
                    start: motif.start,
                    end: motif.end,
                });
                reach = motif.end.saturating_add(extension);
            }
        }
    }
    runs
}

/// Number of runs [`merge_runs`] produces at `extension`
#[must_use]
pub fn merged_count(motifs: &[Motif], extension: i64) -> usize {
    let mut count = 0;
    let mut reach = i64::MIN;
    for motif in motifs {
        if count == 0 || motif.start > reach {
            count += 1;
            reach = motif.end.saturating_add(extension);
        } else {
            reach = reach.max(motif.end.saturating_add(extension));
        }
    }
    count
}

/// Smallest extension radius for which the motifs merge into at most `threshold` runs
///
/// The search interval is `[0, max_start - min_end]`; at its upper bound every motif
/// reaches the last start, so a single run remains. For well-formed motifs this bound
/// never exceeds the domain span `max_end - min_start`.
#[must_use]
pub fn minimal_extension(motifs: &[Motif], threshold: usize) -> i64 {
    let threshold = threshold.max(1);
    let max_start = motifs.iter().map(|m| m.start).max().unwrap_or(0);
    let min_end = motifs.iter().map(|m| m.end).min().unwrap_or(0);

    let mut lo = 0_i64;
    let mut hi = max_start.saturating_sub(min_end).max(0);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if merged_count(motifs, mid) <= threshold {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Bounds motif queries to a configured number of rendered items
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    config: AggregateConfig,
}
impl Aggregator {
    #[must_use]
    pub fn new(config: AggregateConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.config.threshold.max(1)
    }

    /// Filters `motifs` to `[start, end]` and merges them if more than the threshold remain
    #[must_use]
    pub fn aggregate(&self, motifs: &[Motif], start: Option<i64>, end: Option<i64>) -> Aggregation {
        let window = filter_range(motifs, start, end);
        let threshold = self.threshold();
        if window.len() <= threshold {
            return Aggregation::Raw(window);
        }
        let extension = minimal_extension(&window, threshold);
        let runs = merge_runs(&window, extension);
        debug!(
            "aggregated {} motifs into {} runs (extension {extension})",
            window.len(),
            runs.len()
        );
        Aggregation::Merged { extension, runs }
    }

    /// Reads a motif file and aggregates the requested window
    pub fn aggregate_file<P: AsRef<Path>>(
        &self,
        path: P,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Aggregation> {
        let motifs = read_motifs(path)?;
        Ok(self.aggregate(&motifs, start, end))
    }
}
