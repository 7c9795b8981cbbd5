//! Persistent range-maximum segment tree
//!
//! The tree is stored as a flat arena of `f64` values laid out in preorder. For a node at
//! slot `i` covering leaves `lo..=hi` with midpoint `mid = (lo + hi) / 2`, the left child
//! lives at `i + 1` and the right child at `i + 2 * (mid - lo + 1)`. A tree over `n`
//! records therefore holds exactly `2n - 1` nodes.
//!
//! The arena is persisted next to the record file in a sidecar:
//!
//! | Bytes          | Field        | Type      |
//! |----------------|--------------|-----------|
//! | 0..4           | node count   | `i32`, LE |
//! | 4..4 + 8 * n   | node values  | `f64`, LE |
//!
//! A sidecar is built once and trusted thereafter; it carries no checksum against its
//! record file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use log::{info, warn};
use memmap2::Mmap;

use crate::error::{IndexError, ReadError, Result};
use crate::record::{RecordSet, Sample};

/// Size of the node-count prefix in bytes
pub const SIZE_COUNT: usize = 4;
/// Size of a single serialized node in bytes
pub const SIZE_NODE: usize = 8;
/// Extension used for segment-tree sidecars
pub const SIDECAR_EXTENSION: &str = "seg";

/// Returns the sidecar path for a record file (same base name, `.seg` extension)
#[must_use]
pub fn sidecar_path<P: AsRef<Path>>(record_path: P) -> PathBuf {
    record_path.as_ref().with_extension(SIDECAR_EXTENSION)
}

/// Range-maximum index over the magnitudes of a [`RecordSet`]
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTree {
    /// Preorder node arena
    nodes: Vec<f64>,
    /// Number of leaves (records) covered by the tree
    leaves: usize,
}
impl SegmentTree {
    /// Builds the tree over all samples of a record set
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyTree`] if the record set is empty.
    pub fn build(records: &RecordSet) -> Result<Self> {
        let samples = records.samples();
        if samples.is_empty() {
            return Err(IndexError::EmptyTree.into());
        }
        let mut nodes = Vec::with_capacity(2 * samples.len() - 1);
        Self::build_exec(&mut nodes, 0, samples.len() - 1, samples);
        Ok(Self {
            nodes,
            leaves: samples.len(),
        })
    }

    fn build_exec(nodes: &mut Vec<f64>, lo: usize, hi: usize, samples: &[Sample]) {
        if lo == hi {
            nodes.push(samples[lo].magnitude);
            return;
        }
        let index = nodes.len();
        nodes.push(0.0);
        let mid = (lo + hi) / 2;
        Self::build_exec(nodes, lo, mid, samples);
        Self::build_exec(nodes, mid + 1, hi, samples);
        nodes[index] = nodes[index + 1].max(nodes[index + 2 * (mid - lo + 1)]);
    }

    /// Wraps an existing preorder arena
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is empty or has an even length, since neither can
    /// describe a `2n - 1` node tree.
    pub fn from_nodes(nodes: Vec<f64>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(IndexError::EmptyTree.into());
        }
        if nodes.len() % 2 == 0 {
            return Err(IndexError::NodeCountMismatch {
                expected: nodes.len() + 1,
                found: nodes.len(),
            }
            .into());
        }
        let leaves = nodes.len().div_ceil(2);
        Ok(Self { nodes, leaves })
    }

    /// Maximum magnitude over the inclusive leaf range `lo..=hi`
    ///
    /// Returns 0 when the range is empty or lies outside the tree. The sentinel is only
    /// meaningful because magnitudes are non-negative.
    #[must_use]
    pub fn query(&self, lo: usize, hi: usize) -> f64 {
        self.query_node(0, lo, hi, 0, self.leaves - 1)
    }

    /// RMQ recursion rooted at node slot `index` covering leaves `nlo..=nhi`
    #[must_use]
    pub fn query_node(&self, index: usize, qlo: usize, qhi: usize, nlo: usize, nhi: usize) -> f64 {
        if qhi < qlo || qhi < nlo || qlo > nhi {
            return 0.0;
        }
        if qlo <= nlo && qhi >= nhi {
            return self.nodes[index];
        }
        let mid = (nlo + nhi) / 2;
        let left = self.query_node(index + 1, qlo, qhi, nlo, mid);
        let right = self.query_node(index + 2 * (mid - nlo + 1), qlo, qhi, mid + 1, nhi);
        left.max(right)
    }

    /// Global maximum over every leaf
    #[must_use]
    pub fn root_max(&self) -> f64 {
        self.nodes[0]
    }

    #[must_use]
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    #[must_use]
    pub fn num_leaves(&self) -> usize {
        self.leaves
    }

    /// Checks that the tree was built over a record set of this size
    pub fn validate_for(&self, records: &RecordSet) -> Result<()> {
        let expected = (2 * records.len()).saturating_sub(1);
        if self.nodes.len() == expected {
            Ok(())
        } else {
            Err(IndexError::NodeCountMismatch {
                expected,
                found: self.nodes.len(),
            }
            .into())
        }
    }

    /// Serializes the count prefix and every node to the provided writer
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let count = i32::try_from(self.nodes.len())
            .map_err(|_| IndexError::TooManyNodes(self.nodes.len()))?;
        let mut buf = [0; SIZE_NODE];
        LittleEndian::write_i32(&mut buf[..SIZE_COUNT], count);
        writer.write_all(&buf[..SIZE_COUNT])?;
        for &node in &self.nodes {
            LittleEndian::write_f64(&mut buf, node);
            writer.write_all(&buf)?;
        }
        Ok(())
    }

    /// Deserializes a tree from a sidecar buffer
    ///
    /// Trailing bytes past the declared node count are ignored.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_COUNT {
            return Err(IndexError::Truncated {
                expected: SIZE_COUNT,
                found: buffer.len(),
            }
            .into());
        }
        let count = LittleEndian::read_i32(&buffer[..SIZE_COUNT]);
        let Ok(count) = usize::try_from(count) else {
            return Err(IndexError::InvalidNodeCount(count).into());
        };
        let expected = SIZE_COUNT + count * SIZE_NODE;
        if buffer.len() < expected {
            return Err(IndexError::Truncated {
                expected,
                found: buffer.len(),
            }
            .into());
        }
        let nodes = buffer[SIZE_COUNT..expected]
            .chunks_exact(SIZE_NODE)
            .map(LittleEndian::read_f64)
            .collect();
        Self::from_nodes(nodes)
    }

    /// Writes the tree to a sidecar file
    ///
    /// This is a plain write: concurrent processes sharing a data directory may race on
    /// the first build of the same sidecar.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = File::create(path).map(BufWriter::new)?;
        self.write_bytes(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a tree from a sidecar file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReadError::MissingFile(path.to_path_buf()).into());
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(IndexError::Truncated {
                expected: SIZE_COUNT,
                found: 0,
            }
            .into());
        }

        // Safety: the file is open and the data directory is treated as read-only
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    /// Reads the sidecar if it exists, otherwise builds the tree and persists it
    ///
    /// A sidecar that does not match the record set is an error. A failed sidecar write
    /// is logged and the freshly built tree is still returned.
    pub fn load_or_build<P: AsRef<Path>>(records: &RecordSet, sidecar: P) -> Result<Self> {
        let sidecar = sidecar.as_ref();
        if sidecar.exists() {
            let tree = Self::from_path(sidecar)?;
            tree.validate_for(records)?;
            info!(
                "segment tree read from {} ({} nodes)",
                sidecar.display(),
                tree.nodes.len()
            );
            return Ok(tree);
        }

        let tree = Self::build(records)?;
        info!("segment tree constructed ({} nodes)", tree.nodes.len());
        match tree.save_to_path(sidecar) {
            Ok(()) => info!("segment tree written to {}", sidecar.display()),
            Err(err) => warn!("failed to write sidecar {}: {err}", sidecar.display()),
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn records_from(values: &[f64]) -> RecordSet {
        RecordSet::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &m)| Sample::new(i as i32 * 10, m))
                .collect(),
        )
    }

    #[test]
    fn test_scenario_root_and_range() -> Result<()> {
        let records = records_from(&[1.0, 5.0, 2.0, 8.0, 3.0, 1.0]);
        let tree = SegmentTree::build(&records)?;
        assert_eq!(tree.nodes().len(), 11);
        assert_eq!(tree.root_max(), 8.0);
        // positions 20..=40 are indices 2..=4
        assert_eq!(tree.query(2, 4), 8.0);
        assert_eq!(tree.query(4, 5), 3.0);
        assert_eq!(tree.query(0, 0), 1.0);
        Ok(())
    }

    #[test]
    fn test_preorder_layout() -> Result<()> {
        // leaves 0..=2 split at 1: root, [0..=1], 0, 1, 2
        let tree = SegmentTree::build(&records_from(&[4.0, 7.0, 2.0]))?;
        assert_eq!(tree.nodes(), &[7.0, 7.0, 4.0, 7.0, 2.0]);
        Ok(())
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(7)]
    #[case(64)]
    #[case(513)]
    fn test_query_matches_oracle(#[case] n: usize) -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(n as u64);
        let values: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..1000.0)).collect();
        let tree = SegmentTree::build(&records_from(&values))?;
        assert_eq!(tree.nodes().len(), 2 * n - 1);

        for _ in 0..200 {
            let a = rng.random_range(0..n);
            let b = rng.random_range(a..n);
            let oracle = values[a..=b].iter().copied().fold(f64::MIN, f64::max);
            assert_eq!(tree.query(a, b), oracle, "range {a}..={b}");
        }
        Ok(())
    }

    #[test]
    fn test_disjoint_query_is_zero() -> Result<()> {
        let tree = SegmentTree::build(&records_from(&[3.0, 9.0]))?;
        assert_eq!(tree.query(1, 0), 0.0);
        assert_eq!(tree.query(5, 8), 0.0);
        Ok(())
    }

    #[test]
    fn test_empty_build() {
        let err = SegmentTree::build(&RecordSet::default()).unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::EmptyTree)));
    }

    #[test]
    fn test_sidecar_layout() -> Result<()> {
        let tree = SegmentTree::build(&records_from(&[1.0, 2.0]))?;
        let mut buf = Vec::new();
        tree.write_bytes(&mut buf)?;
        assert_eq!(buf.len(), SIZE_COUNT + 3 * SIZE_NODE);
        assert_eq!(&buf[..4], &3i32.to_le_bytes());
        assert_eq!(SegmentTree::from_bytes(&buf)?, tree);
        Ok(())
    }

    #[test]
    fn test_truncated_sidecar() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&5i32.to_le_bytes());
        buf.extend_from_slice(&1.0f64.to_le_bytes());
        let err = SegmentTree::from_bytes(&buf).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::Truncated {
                expected: 44,
                found: 12
            })
        ));
    }

    #[test]
    fn test_negative_count() {
        let buf = (-1i32).to_le_bytes();
        let err = SegmentTree::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::InvalidNodeCount(-1))));
    }

    #[test]
    fn test_load_or_build_persists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sidecar = dir.path().join("track_chr1.seg");
        let records = records_from(&[2.0, 6.0, 4.0]);

        let built = SegmentTree::load_or_build(&records, &sidecar)?;
        assert!(sidecar.exists());
        assert_eq!(
            std::fs::metadata(&sidecar)?.len() as usize,
            SIZE_COUNT + 5 * SIZE_NODE
        );

        let read = SegmentTree::load_or_build(&records, &sidecar)?;
        assert_eq!(read, built);
        Ok(())
    }

    #[test]
    fn test_sidecar_is_trusted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sidecar = dir.path().join("track_chr1.seg");
        let records = records_from(&[2.0, 6.0, 4.0]);

        // A stale sidecar of the right shape is used as-is
        SegmentTree::from_nodes(vec![1.0, 1.0, 1.0, 1.0, 1.0])?.save_to_path(&sidecar)?;
        let tree = SegmentTree::load_or_build(&records, &sidecar)?;
        assert_eq!(tree.root_max(), 1.0);
        Ok(())
    }

    #[test]
    fn test_mismatched_sidecar() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sidecar = dir.path().join("track_chr1.seg");
        SegmentTree::build(&records_from(&[1.0]))?.save_to_path(&sidecar)?;

        let err = SegmentTree::load_or_build(&records_from(&[1.0, 2.0]), &sidecar).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::NodeCountMismatch {
                expected: 3,
                found: 1
            })
        ));
        Ok(())
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path("data/ab/ab_chr2.bcwig"),
            PathBuf::from("data/ab/ab_chr2.seg")
        );
    }
}
