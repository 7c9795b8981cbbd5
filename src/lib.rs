//! # tracksample
//!
//! Server-side data reduction for genome-browser tracks.
//!
//! Two bounded queries are answered against per-chromosome files that may be far larger
//! than a client can render:
//!
//! * **Histograms** over continuous coverage/binding tracks: the maximum signal in each
//!   of `n` equal bins of an arbitrary interval, answered by a range-maximum
//!   [`SegmentTree`] that is built once per record file and persisted in a `.seg`
//!   sidecar. Decoded indices are kept in a small FIFO [`IndexCache`].
//! * **Motif windows** over discrete interval annotations: the motifs overlapping a range,
//!   merged into at most `K` runs by a binary search on the merge radius.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tracksample::{DataLayout, HistogramRequest, MotifRequest, QueryService, ServiceConfig};
//!
//! let config = ServiceConfig::new(DataLayout::new("/srv/genome/wiggle"));
//! let mut service = QueryService::new(config);
//!
//! // 1000 bins over the whole of chromosome 3
//! let histogram = service.histogram(&HistogramRequest::new("batf", "3"));
//!
//! // at most 200 motifs (or merged runs) inside a window
//! let motifs = service.motifs(&MotifRequest::new("batf", "3").range(3_000_000, 3_100_000));
//! ```
//!
//! Lower-level building blocks ([`read_records`], [`SegmentTree`], [`IndexCache`],
//! [`HistogramSampler`], [`Aggregator`]) can be used directly when the data directory
//! does not follow the [`DataLayout`] naming convention.

mod cache;
mod error;
mod exon;
mod histogram;
mod locate;
mod motif;
mod record;
mod segtree;
mod service;

pub use cache::{CacheConfig, ChromosomeIndex, IndexCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Error, IndexError, ParseError, QueryError, ReadError, Result};
pub use exon::{exons_on, parse_exons, read_exons, search_gene, Exon, ExonRange, GeneLocus};
pub use histogram::{
    Bin, BinSpacing, Histogram, HistogramSampler, SamplerConfig, DEFAULT_EPSILON,
    DEFAULT_MAX_SAMPLES, DEFAULT_SAMPLES,
};
pub use locate::{leaf_span, locate, predecessor_index, Endpoint};
pub use motif::{
    filter_range, merge_runs, merged_count, minimal_extension, read_motifs, AggregateConfig,
    AggregatedMotif, Aggregation, Aggregator, Motif, DEFAULT_THRESHOLD,
};
pub use record::{read_records, RecordSet, Sample, SIZE_RECORD};
pub use segtree::{sidecar_path, SegmentTree, SIDECAR_EXTENSION};
pub use service::{
    DataLayout, GeneSearch, HistogramPayload, HistogramRequest, HistogramResponse, MotifPayload,
    MotifRequest, MotifResponse, QueryService, Response, ServiceConfig,
};

#[cfg(test)]
mod testing {

    use super::*;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    fn write_records(path: &Path, samples: &[(i32, f64)]) -> Result<()> {
        let mut writer = File::create(path).map(BufWriter::new)?;
        for &(position, magnitude) in samples {
            Sample::new(position, magnitude).write_bytes(&mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[test]
    fn test_scenario_range_maximum() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scenario_chr1.bcwig");
        write_records(
            &path,
            &[(0, 1.0), (10, 5.0), (20, 2.0), (30, 8.0), (40, 3.0), (50, 1.0)],
        )?;

        let records = read_records(&path)?;
        let tree = SegmentTree::build(&records)?;
        assert_eq!(tree.root_max(), 8.0);

        let lo = predecessor_index(&records, 20.0).ok_or_else(|| anyhow::anyhow!("no index"))?;
        let hi = predecessor_index(&records, 40.0).ok_or_else(|| anyhow::anyhow!("no index"))?;
        assert_eq!(tree.query(lo, hi), 8.0);
        Ok(())
    }

    #[test]
    fn test_sidecar_survives_cache_eviction() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| dir.path().join(format!("track_chr{i}.bcwig")))
            .collect();
        for (i, path) in paths.iter().enumerate() {
            write_records(path, &[(0, i as f64), (100, 2.0 * i as f64)])?;
        }

        let mut cache = IndexCache::with_capacity(2);
        let sampler = HistogramSampler::default();
        let before = sampler.histogram(&mut cache, &paths[0], None, None, Some(10))?;
        sampler.histogram(&mut cache, &paths[1], None, None, Some(10))?;
        sampler.histogram(&mut cache, &paths[2], None, None, Some(10))?;
        assert!(!cache.contains(&paths[0]));
        assert!(sidecar_path(&paths[0]).exists());

        // reloaded from the sidecar after eviction
        let after = sampler.histogram(&mut cache, &paths[0], None, None, Some(10))?;
        assert_eq!(before, after);
        Ok(())
    }

    #[test]
    fn test_two_motifs_single_run() {
        let motifs = vec![
            Motif::new(0, 5, Some("a".into())),
            Motif::new(100, 105, Some("b".into())),
        ];
        let aggregation =
            Aggregator::new(AggregateConfig::with_threshold(1)).aggregate(&motifs, None, None);
        assert!(aggregation.is_aggregated());
        assert_eq!(aggregation.len(), 1);
        let Aggregation::Merged { runs, .. } = aggregation else {
            unreachable!()
        };
        assert_eq!(runs[0], AggregatedMotif { start: 0, end: 105 });
    }
}
