//! Histogram sampler
//!
//! Reduces a chromosome track to a fixed number of bins, each holding the maximum
//! magnitude of the samples it covers. Bin endpoints are mapped to leaf ranges with the
//! [coordinate locator](crate::locate) and answered by the segment tree, so a query costs
//! `O(n log m)` for `n` bins over `m` records regardless of the range width.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cache::{ChromosomeIndex, IndexCache};
use crate::error::{QueryError, Result};
use crate::locate::leaf_span;

/// Default number of bins per histogram
pub const DEFAULT_SAMPLES: usize = 1000;

/// Default upper bound on the bin count a single query may request
pub const DEFAULT_MAX_SAMPLES: usize = 1_000_000;

/// Default nudge subtracted from each bin's right edge
///
/// Keeps adjacent bins from both claiming a sample sitting exactly on their shared
/// boundary.
pub const DEFAULT_EPSILON: f64 = 0.1;

/// How the query range is divided between bins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinSpacing {
    /// Bin width is `span / (n - 1)`; the last bin starts at the range end and overshoots it
    #[default]
    Legacy,
    /// Bin width is `span / n`; bins tile the range exactly
    Exact,
}
impl BinSpacing {
    fn denominator(self, samples: usize) -> f64 {
        match self {
            Self::Legacy => samples.saturating_sub(1).max(1) as f64,
            Self::Exact => samples as f64,
        }
    }
}

/// Configuration of a [`HistogramSampler`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerConfig {
    /// Number of bins used when a query does not name one
    pub samples: usize,
    /// Right-edge nudge applied to every bin
    pub epsilon: f64,
    pub spacing: BinSpacing,
    /// Largest bin count a query may request
    pub max_samples: usize,
}
impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            epsilon: DEFAULT_EPSILON,
            spacing: BinSpacing::default(),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}
impl SamplerConfig {
    #[must_use]
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }
    #[must_use]
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
    #[must_use]
    pub fn spacing(mut self, spacing: BinSpacing) -> Self {
        self.spacing = spacing;
        self
    }
    #[must_use]
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }
}

/// One histogram bar: the left edge of the bin and the maximum magnitude inside it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub x: f64,
    pub value: f64,
}

/// A sampled view of one chromosome track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    /// Left end of the sampled range
    pub x_min: f64,
    /// Right end of the sampled range
    pub x_max: f64,
    pub values: Vec<Bin>,
    /// Largest bin value in this histogram
    pub bin_max: f64,
    /// Largest magnitude on the whole chromosome, independent of the sampled range
    pub domain_max: f64,
}
impl Histogram {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Produces max-histograms from cached chromosome indices
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramSampler {
    config: SamplerConfig,
}
impl HistogramSampler {
    #[must_use]
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> SamplerConfig {
        self.config
    }

    /// Loads (or fetches) the index for `path` and samples it
    ///
    /// The requested range is used only when both `start` and `end` are given; otherwise
    /// the whole domain from the first to the last sample position is sampled. `samples`
    /// defaults to the configured bin count.
    pub fn histogram<P: AsRef<Path>>(
        &self,
        cache: &mut IndexCache,
        path: P,
        start: Option<f64>,
        end: Option<f64>,
        samples: Option<usize>,
    ) -> Result<Histogram> {
        let index = cache.get(path)?;
        self.sample(&index, start, end, samples)
    }

    /// Samples an already loaded index
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MalformedRange`] if `end < start`,
    /// [`QueryError::ZeroSamples`] if zero bins are requested and
    /// [`QueryError::TooManySamples`] if more than `max_samples` bins are requested.
    pub fn sample(
        &self,
        index: &ChromosomeIndex,
        start: Option<f64>,
        end: Option<f64>,
        samples: Option<usize>,
    ) -> Result<Histogram> {
        let (xl, xr) = match (start, end) {
            (Some(xl), Some(xr)) => (xl, xr),
            _ => (f64::from(index.domain_min()), f64::from(index.domain_max())),
        };
        if xr < xl {
            return Err(QueryError::MalformedRange { start: xl, end: xr }.into());
        }
        let n = samples.unwrap_or(self.config.samples);
        if n == 0 {
            return Err(QueryError::ZeroSamples.into());
        }
        if n > self.config.max_samples {
            return Err(QueryError::TooManySamples {
                requested: n,
                limit: self.config.max_samples,
            }
            .into());
        }

        let records = index.records();
        let tree = index.tree();
        let domain_max = tree.query(0, records.len() - 1);

        let span = xr - xl;
        let denominator = self.config.spacing.denominator(n);
        let mut values = Vec::with_capacity(n);
        let mut bin_max = 0.0_f64;
        for i in 0..n {
            let left = xl + i as f64 / denominator * span;
            let right = xl + (i + 1) as f64 / denominator * span - self.config.epsilon;
            let value = match leaf_span(records, left, right) {
                Some((lo, hi)) => tree.query(lo, hi),
                None => 0.0,
            };
            bin_max = bin_max.max(value);
            values.push(Bin { x: left, value });
        }
        debug!("returning {n} samples of [{xl}, {xr}]");

        Ok(Histogram {
            x_min: xl,
            x_max: xr,
            values,
            bin_max,
            domain_max,
        })
    }
}
