//! Request/response surface for the hosting HTTP layer
//!
//! [`QueryService`] owns the index cache and resolves `(fileIdentity, chromosome)` pairs to
//! files under a data directory. Every query returns either its payload or an
//! `{"error": ...}` object; failures never escape as panics or partial results.

use std::path::{Component, Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, IndexCache};
use crate::error::{Error, QueryError, Result};
use crate::exon::{self, Exon, GeneLocus};
use crate::histogram::{Bin, HistogramSampler, SamplerConfig};
use crate::motif::{AggregateConfig, Aggregation, Aggregator, Motif};

/// Default extension of chromosome record files
pub const RECORD_EXTENSION: &str = "bcwig";
/// Default extension of motif files
pub const MOTIF_EXTENSION: &str = "bed";

/// Naming convention of the data directory
///
/// Files live at `<root>/<identity>/<identity>_chr<chromosome>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataLayout {
    pub root: PathBuf,
    pub record_extension: String,
    pub motif_extension: String,
}
impl Default for DataLayout {
    fn default() -> Self {
        Self::new(".")
    }
}
impl DataLayout {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            record_extension: RECORD_EXTENSION.to_string(),
            motif_extension: MOTIF_EXTENSION.to_string(),
        }
    }

    /// Path of the record file for one dataset and chromosome
    pub fn record_path(&self, identity: &str, chromosome: &str) -> Result<PathBuf> {
        self.resolve(identity, chromosome, &self.record_extension)
    }

    /// Path of the motif file for one dataset and chromosome
    pub fn motif_path(&self, identity: &str, chromosome: &str) -> Result<PathBuf> {
        self.resolve(identity, chromosome, &self.motif_extension)
    }

    fn resolve(&self, identity: &str, chromosome: &str, extension: &str) -> Result<PathBuf> {
        check_identifier(identity)?;
        check_identifier(chromosome)?;
        Ok(self
            .root
            .join(identity)
            .join(format!("{identity}_chr{chromosome}.{extension}")))
    }
}

/// Rejects names that are empty or would resolve outside their directory
fn check_identifier(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(QueryError::InvalidIdentifier(name.to_string()).into()),
    }
}

/// Configuration of a [`QueryService`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub layout: DataLayout,
    pub cache: CacheConfig,
    pub sampler: SamplerConfig,
    pub aggregate: AggregateConfig,
    /// Gene/exon annotation file used by gene queries
    pub exon_file: Option<PathBuf>,
}
impl ServiceConfig {
    #[must_use]
    pub fn new(layout: DataLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }
    #[must_use]
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
    #[must_use]
    pub fn sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }
    #[must_use]
    pub fn aggregate(mut self, aggregate: AggregateConfig) -> Self {
        self.aggregate = aggregate;
        self
    }
    #[must_use]
    pub fn exon_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.exon_file = Some(path.into());
        self
    }
}

/// Either a payload or an error message, serialized untagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response<T> {
    Ok(T),
    Error { error: String },
}
impl<T> Response<T> {
    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(payload) => Self::Ok(payload),
            Err(err) => {
                warn!("query failed: {err}");
                let error = if err.is_not_found() {
                    format!("data unavailable: {err}")
                } else {
                    err.to_string()
                };
                Self::Error { error }
            }
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Ok(payload) => Some(payload),
            Self::Error { .. } => None,
        }
    }
}

/// Histogram query for one dataset and chromosome
///
/// The range applies only when both `rangeStart` and `rangeEnd` are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramRequest {
    pub file_identity: String,
    pub chromosome: String,
    #[serde(default)]
    pub range_start: Option<f64>,
    #[serde(default)]
    pub range_end: Option<f64>,
    #[serde(default)]
    pub sample_count: Option<usize>,
}
impl HistogramRequest {
    #[must_use]
    pub fn new(file_identity: &str, chromosome: &str) -> Self {
        Self {
            file_identity: file_identity.to_string(),
            chromosome: chromosome.to_string(),
            range_start: None,
            range_end: None,
            sample_count: None,
        }
    }
    #[must_use]
    pub fn range(mut self, start: f64, end: f64) -> Self {
        self.range_start = Some(start);
        self.range_end = Some(end);
        self
    }
    #[must_use]
    pub fn samples(mut self, count: usize) -> Self {
        self.sample_count = Some(count);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramPayload {
    pub chromosome: String,
    /// Left end of the sampled range
    pub domain_min: f64,
    /// Right end of the sampled range
    pub domain_max: f64,
    pub bin_values: Vec<Bin>,
    pub bin_value_max: f64,
    /// Largest value on the whole chromosome
    pub domain_value_max: f64,
}

pub type HistogramResponse = Response<HistogramPayload>;

/// Motif query for one dataset and chromosome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotifRequest {
    pub file_identity: String,
    pub chromosome: String,
    #[serde(default)]
    pub range_start: Option<i64>,
    #[serde(default)]
    pub range_end: Option<i64>,
}
impl MotifRequest {
    #[must_use]
    pub fn new(file_identity: &str, chromosome: &str) -> Self {
        Self {
            file_identity: file_identity.to_string(),
            chromosome: chromosome.to_string(),
            range_start: None,
            range_end: None,
        }
    }
    #[must_use]
    pub fn range(mut self, start: i64, end: i64) -> Self {
        self.range_start = Some(start);
        self.range_end = Some(end);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotifPayload {
    pub aggregated: bool,
    /// Raw motifs keep their labels; merged runs have none
    pub motifs: Vec<Motif>,
}
impl From<Aggregation> for MotifPayload {
    fn from(aggregation: Aggregation) -> Self {
        match aggregation {
            Aggregation::Raw(motifs) => Self {
                aggregated: false,
                motifs,
            },
            Aggregation::Merged { runs, .. } => Self {
                aggregated: true,
                motifs: runs
                    .into_iter()
                    .map(|run| Motif::new(run.start, run.end, None))
                    .collect(),
            },
        }
    }
}

pub type MotifResponse = Response<MotifPayload>;

/// Outcome of a gene-name search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSearch {
    pub success: bool,
    #[serde(flatten)]
    pub locus: Option<GeneLocus>,
}

/// Answers histogram, motif and gene queries against one data directory
#[derive(Debug)]
pub struct QueryService {
    config: ServiceConfig,
    cache: IndexCache,
    sampler: HistogramSampler,
    aggregator: Aggregator,
}
impl QueryService {
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            cache: IndexCache::new(config.cache),
            sampler: HistogramSampler::new(config.sampler),
            aggregator: Aggregator::new(config.aggregate),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn histogram(&mut self, request: &HistogramRequest) -> HistogramResponse {
        Response::from_result(self.try_histogram(request))
    }

    pub fn try_histogram(&mut self, request: &HistogramRequest) -> Result<HistogramPayload> {
        let path = self
            .config
            .layout
            .record_path(&request.file_identity, &request.chromosome)?;
        let histogram = self.sampler.histogram(
            &mut self.cache,
            path,
            request.range_start,
            request.range_end,
            request.sample_count,
        )?;
        Ok(HistogramPayload {
            chromosome: request.chromosome.clone(),
            domain_min: histogram.x_min,
            domain_max: histogram.x_max,
            bin_values: histogram.values,
            bin_value_max: histogram.bin_max,
            domain_value_max: histogram.domain_max,
        })
    }

    #[must_use]
    pub fn motifs(&self, request: &MotifRequest) -> MotifResponse {
        Response::from_result(self.try_motifs(request))
    }

    pub fn try_motifs(&self, request: &MotifRequest) -> Result<MotifPayload> {
        let path = self
            .config
            .layout
            .motif_path(&request.file_identity, &request.chromosome)?;
        let aggregation =
            self.aggregator
                .aggregate_file(path, request.range_start, request.range_end)?;
        Ok(aggregation.into())
    }

    /// Transcripts annotated on `chromosome`
    #[must_use]
    pub fn exons(&self, chromosome: &str) -> Response<Vec<Exon>> {
        Response::from_result(
            self.exon_file()
                .and_then(|path| exon::exons_on(path, chromosome)),
        )
    }

    /// Locates a gene by symbol, ignoring case
    #[must_use]
    pub fn search_gene(&self, name: &str) -> Response<GeneSearch> {
        Response::from_result(self.exon_file().and_then(|path| {
            let locus = exon::search_gene(path, name)?;
            Ok(GeneSearch {
                success: locus.is_some(),
                locus,
            })
        }))
    }

    fn exon_file(&self) -> Result<&Path> {
        self.config
            .exon_file
            .as_deref()
            .ok_or(Error::QueryError(QueryError::MissingAnnotation))
    }
}
