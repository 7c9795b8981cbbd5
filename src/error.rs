use std::path::PathBuf;

/// Custom Result type for tracksample operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the tracksample library, encompassing all possible error cases
/// that can occur while loading, indexing and sampling genome tracks.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors that occur while reading record, motif or exon files
    ReadError(#[from] ReadError),
    /// Errors related to the segment-tree sidecar
    IndexError(#[from] IndexError),
    /// Errors caused by invalid query arguments
    QueryError(#[from] QueryError),
    /// Errors while parsing text-based annotation files
    ParseError(#[from] ParseError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Returns true if the error stems from a data file that does not exist.
    ///
    /// The query service reports these as "data unavailable" rather than as failures.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ReadError(ReadError::MissingFile(_)) => true,
            Self::IoError(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors that can occur while reading data files
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The requested file does not exist
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The path exists but is not a regular file (e.g., it might be a directory)
    #[error("File is not regular: {}", .0.display())]
    IncompatibleFile(PathBuf),

    /// The file holds no records, so it has no domain to sample
    #[error("File contains no records: {}", .0.display())]
    EmptyRecordSet(PathBuf),

    /// The file appears to be truncated or corrupted
    ///
    /// # Arguments
    /// * `usize` - The byte position where the truncation was detected
    #[error(
        "Number of bytes in file does not match expectation - possibly truncated at byte pos {0}"
    )]
    FileTruncation(usize),
}

/// Errors specific to the persisted segment tree
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The node count declared by the sidecar does not fit the record set
    ///
    /// # Fields
    /// * `expected` - The node count implied by the number of records (`2n - 1`)
    /// * `found` - The node count stored in the sidecar
    #[error("Sidecar holds {found} nodes but the record set requires {expected}")]
    NodeCountMismatch { expected: usize, found: usize },

    /// The sidecar ends before all declared nodes were read
    #[error("Sidecar is truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    /// The sidecar declares a negative node count
    #[error("Invalid node count in sidecar: {0}")]
    InvalidNodeCount(i32),

    /// The tree has more nodes than the 4-byte sidecar count can describe
    #[error("Segment tree with {0} nodes cannot be persisted")]
    TooManyNodes(usize),

    /// A tree cannot be built over zero records
    #[error("Cannot build a segment tree over an empty record set")]
    EmptyTree,
}

/// Errors caused by the arguments of a query
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// The right end of the requested range lies before its left end
    #[error("Malformed range: end ({end}) lies before start ({start})")]
    MalformedRange { start: f64, end: f64 },

    /// A histogram needs at least one bin
    #[error("Sample count must be at least 1")]
    ZeroSamples,

    /// The requested bin count exceeds the configured limit
    #[error("Sample count {requested} exceeds the limit of {limit}")]
    TooManySamples { requested: usize, limit: usize },

    /// A dataset identity or chromosome name would escape the data directory
    #[error("Invalid identifier: `{0}`")]
    InvalidIdentifier(String),

    /// Gene queries need an annotation file, and none is configured
    #[error("No exon annotation file configured")]
    MissingAnnotation,
}

/// Errors that can occur while parsing text annotation files
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// A line is missing a required column
    ///
    /// # Arguments
    /// * `usize` - The 1-based line number
    /// * `&'static str` - Name of the missing column
    #[error("Line {0}: missing column `{1}`")]
    MissingColumn(usize, &'static str),

    /// A coordinate column could not be parsed as an integer
    #[error("Line {0}: invalid coordinate `{1}`")]
    InvalidCoordinate(usize, String),

    /// The header string of an exon entry does not have its four fields
    #[error("Malformed exon header: `{0}`")]
    MalformedExonHeader(String),

    /// An exon entry declares a negative exon count
    #[error("Invalid exon count: {0}")]
    InvalidExonCount(i32),
}
