//! Binary record store
//!
//! A record file holds the samples of one track on one chromosome. There is no header:
//! the file is a flat run of fixed 12-byte records, sorted ascending by position.
//!
//! | Bytes  | Field       | Type             |
//! |--------|-------------|------------------|
//! | 0..4   | `position`  | `i32`, LE        |
//! | 4..12  | `magnitude` | `f64`, LE        |
//!
//! Sortedness is guaranteed by the ingestion pipeline and is not validated here.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::error::{ReadError, Result};

/// Size of a single encoded [`Sample`] in bytes
pub const SIZE_RECORD: usize = 12;

/// A single (position, magnitude) sample of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Genomic coordinate of the sample
    ///
    /// (4 bytes in serialized form)
    pub position: i32,

    /// Non-negative signal value at `position`
    ///
    /// (8 bytes in serialized form)
    pub magnitude: f64,
}
impl Sample {
    #[must_use]
    pub fn new(position: i32, magnitude: f64) -> Self {
        Self {
            position,
            magnitude,
        }
    }

    /// Deserializes a `Sample` from a fixed-size buffer
    #[must_use]
    pub fn from_exact(buffer: &[u8; SIZE_RECORD]) -> Self {
        Self {
            position: LittleEndian::read_i32(&buffer[0..4]),
            magnitude: LittleEndian::read_f64(&buffer[4..12]),
        }
    }

    /// Serializes the sample to its 12-byte layout and writes it to the provided writer
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0; SIZE_RECORD];
        LittleEndian::write_i32(&mut buf[0..4], self.position);
        LittleEndian::write_f64(&mut buf[4..12], self.magnitude);
        writer.write_all(&buf)?;
        Ok(())
    }
}

/// The ordered samples of one (dataset, chromosome) pair
///
/// A `RecordSet` is immutable once decoded. It is owned by the
/// [`ChromosomeIndex`](crate::ChromosomeIndex) that loaded it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    samples: Vec<Sample>,
}
impl RecordSet {
    /// Wraps already-sorted samples
    #[must_use]
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Decodes a record set from an in-memory buffer
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::FileTruncation`] if the buffer length is not a whole number
    /// of records.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if !buffer.len().is_multiple_of(SIZE_RECORD) {
            let whole = buffer.len() - buffer.len() % SIZE_RECORD;
            return Err(ReadError::FileTruncation(whole).into());
        }
        let samples = buffer
            .chunks_exact(SIZE_RECORD)
            .map(|chunk| {
                let mut record = [0u8; SIZE_RECORD];
                record.copy_from_slice(chunk);
                Sample::from_exact(&record)
            })
            .collect();
        Ok(Self { samples })
    }

    /// Reads and decodes a whole record file
    ///
    /// Absence is detected with an existence check before the file is opened, so a
    /// missing file yields [`ReadError::MissingFile`] rather than a raw I/O error.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file does not exist or is not a regular file
    /// * The file is empty
    /// * The file size is not a multiple of [`SIZE_RECORD`]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReadError::MissingFile(path.to_path_buf()).into());
        }
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(ReadError::IncompatibleFile(path.to_path_buf()).into());
        }
        if metadata.len() == 0 {
            return Err(ReadError::EmptyRecordSet(path.to_path_buf()).into());
        }

        // Safety: the file is open and the data directory is treated as read-only
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    /// Encodes all samples back into the record file layout
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.samples
            .iter()
            .try_for_each(|sample| sample.write_bytes(writer))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Returns the positions of the first and last sample
    #[must_use]
    pub fn domain(&self) -> Option<(i32, i32)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.position, last.position)),
            _ => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Reads the record file at `path`
///
/// Convenience wrapper around [`RecordSet::from_path`].
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<RecordSet> {
    RecordSet::from_path(path)
}
