//! Chromosome index cache
//!
//! A small, bounded map from record-file path to its decoded records and segment tree.
//! Eviction is strictly FIFO: the oldest inserted entry is dropped when the cache is full,
//! and lookups never change the eviction order.
//!
//! The cache holds no internal lock. [`IndexCache::get`] takes `&mut self`, so a host that
//! serves requests from several threads wraps the cache in a mutex.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::record::{read_records, RecordSet};
use crate::segtree::{sidecar_path, SegmentTree};

/// Default number of chromosome indices kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// Configuration of an [`IndexCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Maximum number of resident entries (values below 1 are treated as 1)
    pub capacity: usize,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
impl CacheConfig {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

/// Records and range-maximum tree of one (dataset, chromosome) pair
#[derive(Debug)]
pub struct ChromosomeIndex {
    records: RecordSet,
    tree: SegmentTree,
    domain_min: i32,
    domain_max: i32,
}
impl ChromosomeIndex {
    /// Pairs a record set with a tree built over it
    ///
    /// # Errors
    ///
    /// Returns an error if the record set is empty or the tree was built over a record
    /// set of a different size.
    pub fn new(records: RecordSet, tree: SegmentTree) -> Result<Self> {
        let Some((domain_min, domain_max)) = records.domain() else {
            return Err(IndexError::EmptyTree.into());
        };
        tree.validate_for(&records)?;
        Ok(Self {
            records,
            tree,
            domain_min,
            domain_max,
        })
    }

    /// Decodes the record file and reads or builds its sidecar tree
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let records = read_records(path)?;
        debug!("read {} records from {}", records.len(), path.display());
        let tree = SegmentTree::load_or_build(&records, sidecar_path(path))?;
        Self::new(records, tree)
    }

    #[must_use]
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    #[must_use]
    pub fn tree(&self) -> &SegmentTree {
        &self.tree
    }

    /// Position of the first sample
    #[must_use]
    pub fn domain_min(&self) -> i32 {
        self.domain_min
    }

    /// Position of the last sample
    #[must_use]
    pub fn domain_max(&self) -> i32 {
        self.domain_max
    }

    /// Maximum magnitude over the whole chromosome
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.tree.root_max()
    }
}

/// Bounded FIFO cache of [`ChromosomeIndex`] entries keyed by record-file path
#[derive(Debug, Default)]
pub struct IndexCache {
    config: CacheConfig,
    /// Keys in insertion order; the front is evicted first
    order: VecDeque<PathBuf>,
    entries: HashMap<PathBuf, Arc<ChromosomeIndex>>,
}
impl IndexCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            order: VecDeque::with_capacity(config.capacity.max(1)),
            entries: HashMap::with_capacity(config.capacity.max(1)),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(CacheConfig::with_capacity(capacity))
    }

    /// Returns the index for `path`, loading and inserting it on a miss
    ///
    /// A hit returns the stored entry without touching the eviction order. A failed load
    /// leaves the cache unchanged.
    pub fn get<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<ChromosomeIndex>> {
        let path = path.as_ref();
        if let Some(index) = self.entries.get(path) {
            debug!("cache hit: {}", path.display());
            return Ok(Arc::clone(index));
        }
        debug!("cache miss: {}", path.display());

        let index = Arc::new(ChromosomeIndex::load(path)?);
        self.insert(path.to_path_buf(), Arc::clone(&index));
        Ok(index)
    }

    fn insert(&mut self, key: PathBuf, index: Arc<ChromosomeIndex>) {
        while self.order.len() >= self.capacity() {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            info!("cache full, evicted {}", oldest.display());
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, index);
    }

    #[must_use]
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.entries.contains_key(path.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.capacity.max(1)
    }

    /// Resident keys, oldest first
    pub fn keys(&self) -> impl Iterator<Item = &Path> {
        self.order.iter().map(PathBuf::as_path)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::Error;
    use crate::record::Sample;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::thread;

    use parking_lot::Mutex;

    /// Writes a record file with the given (position, magnitude) pairs
    pub(crate) fn write_track(path: &Path, samples: &[(i32, f64)]) -> Result<()> {
        let records = RecordSet::new(samples.iter().map(|&(p, m)| Sample::new(p, m)).collect());
        let mut writer = File::create(path).map(BufWriter::new)?;
        records.write_bytes(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn tracks(dir: &Path, n: usize) -> Result<Vec<PathBuf>> {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("track_chr{i}.bcwig"));
                write_track(&path, &[(0, i as f64), (10, 1.0)])?;
                Ok(path)
            })
            .collect()
    }

    #[test]
    fn test_miss_then_hit() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = tracks(dir.path(), 1)?;
        let mut cache = IndexCache::default();

        let first = cache.get(&paths[0])?;
        assert!(paths[0].with_extension("seg").exists());
        let second = cache.get(&paths[0])?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.domain_min(), 0);
        assert_eq!(first.domain_max(), 10);
        Ok(())
    }

    #[test]
    fn test_fifo_eviction_ignores_recency() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = tracks(dir.path(), 5)?;
        let mut cache = IndexCache::with_capacity(4);

        for path in &paths[..4] {
            cache.get(path)?;
        }
        // touching the oldest entry does not protect it
        cache.get(&paths[0])?;
        cache.get(&paths[4])?;

        assert_eq!(cache.len(), 4);
        assert!(!cache.contains(&paths[0]));
        let keys: Vec<&Path> = cache.keys().collect();
        let expected: Vec<&Path> = paths[1..].iter().map(PathBuf::as_path).collect();
        assert_eq!(keys, expected);
        Ok(())
    }

    #[test]
    fn test_evicted_handle_stays_valid() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = tracks(dir.path(), 2)?;
        let mut cache = IndexCache::with_capacity(1);

        let held = cache.get(&paths[0])?;
        cache.get(&paths[1])?;
        assert!(!cache.contains(&paths[0]));
        assert_eq!(held.max_value(), 1.0);
        Ok(())
    }

    #[test]
    fn test_zero_capacity_keeps_one() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = tracks(dir.path(), 2)?;
        let mut cache = IndexCache::with_capacity(0);
        cache.get(&paths[0])?;
        cache.get(&paths[1])?;
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&paths[1]));
        Ok(())
    }

    #[test]
    fn test_failed_load_is_not_cached() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cache = IndexCache::default();
        let err = cache.get(dir.path().join("missing.bcwig")).unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn test_index_rejects_foreign_tree() -> Result<()> {
        let records = RecordSet::new(vec![Sample::new(0, 1.0), Sample::new(5, 2.0)]);
        let tree = SegmentTree::build(&RecordSet::new(vec![Sample::new(0, 1.0)]))?;
        let err = ChromosomeIndex::new(records, tree).unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::NodeCountMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = tracks(dir.path(), 2)?;
        let mut cache = IndexCache::default();
        cache.get(&paths[0])?;
        cache.get(&paths[1])?;
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.keys().count(), 0);
        Ok(())
    }

    #[test]
    fn test_shared_behind_mutex() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = tracks(dir.path(), 3)?;
        let cache = Arc::new(Mutex::new(IndexCache::default()));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let path = paths[i % paths.len()].clone();
                thread::spawn(move || cache.lock().get(&path).map(|index| index.max_value()))
            })
            .collect();
        for handle in handles {
            let value = handle.join().map_err(|_| anyhow::anyhow!("worker panicked"))??;
            assert!(value >= 1.0);
        }
        assert_eq!(cache.lock().len(), 3);
        Ok(())
    }
}
