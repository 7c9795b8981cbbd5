//! # motif
//!
//! Discrete interval annotations (e.g. binding-site motifs) for one chromosome.
//!
//! A motif file is plain text with one motif per line:
//!
//! ```text
//! <start>\t<end>\t<label>
//! ```
//!
//! The label column is optional. Lines are expected to be sorted ascending by `start`;
//! the range scan in [`filter_range`] relies on that order to stop early.
//!
//! Aggregation of dense motif sets down to a renderable number of runs lives in
//! [`aggregate`].

mod aggregate;

pub use aggregate::{
    filter_range, merge_runs, merged_count, minimal_extension, AggregateConfig, Aggregation,
    Aggregator, DEFAULT_THRESHOLD,
};

use std::fmt::{self, Display};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ReadError, Result};

/// A labeled genomic interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motif {
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
impl Motif {
    #[must_use]
    pub fn new(start: i64, end: i64, label: Option<String>) -> Self {
        Self { start, end, label }
    }

    /// Parses one tab-separated line; `line_number` is 1-based and only used for errors
    pub fn from_line(line: &str, line_number: usize) -> Result<Self> {
        let mut fields = line.split('\t');
        let start = parse_coordinate(fields.next(), line_number, "start")?;
        let end = parse_coordinate(fields.next(), line_number, "end")?;
        let label = fields
            .next()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);
        Ok(Self { start, end, label })
    }

    /// True if the motif intersects the inclusive range `[start, end]`
    #[must_use]
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start <= end && self.end >= start
    }
}

impl Display for Motif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.start, self.end)?;
        if let Some(label) = &self.label {
            write!(f, "\t{label}")?;
        }
        Ok(())
    }
}

/// A run of merged motifs; labels are dropped once motifs are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedMotif {
    pub start: i64,
    pub end: i64,
}

fn parse_coordinate(field: Option<&str>, line_number: usize, column: &'static str) -> Result<i64> {
    let Some(field) = field else {
        return Err(ParseError::MissingColumn(line_number, column).into());
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(ParseError::MissingColumn(line_number, column).into());
    }
    field
        .parse()
        .map_err(|_| ParseError::InvalidCoordinate(line_number, field.to_string()).into())
}

/// Reads every motif of a motif file, skipping blank lines
pub fn read_motifs<P: AsRef<Path>>(path: P) -> Result<Vec<Motif>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReadError::MissingFile(path.to_path_buf()).into());
    }
    let reader = File::open(path).map(BufReader::new)?;
    let mut motifs = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        motifs.push(Motif::from_line(&line, index + 1)?);
    }
    Ok(motifs)
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_parse_line() -> Result<()> {
        let motif = Motif::from_line("3000010\t3000015\tabcdefghij", 1)?;
        assert_eq!(motif, Motif::new(3_000_010, 3_000_015, Some("abcdefghij".into())));
        assert_eq!(motif.to_string(), "3000010\t3000015\tabcdefghij");
        Ok(())
    }

    #[test]
    fn test_parse_without_label() -> Result<()> {
        let motif = Motif::from_line("5\t9", 1)?;
        assert_eq!(motif.label, None);
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let err = Motif::from_line("12", 4).unwrap_err();
        assert!(matches!(
            err,
            Error::ParseError(ParseError::MissingColumn(4, "end"))
        ));
        let err = Motif::from_line("a\t5\tx", 2).unwrap_err();
        assert!(matches!(
            err,
            Error::ParseError(ParseError::InvalidCoordinate(2, _))
        ));
    }

    #[test]
    fn test_overlaps() {
        let motif = Motif::new(10, 20, None);
        assert!(motif.overlaps(20, 30));
        assert!(motif.overlaps(0, 10));
        assert!(!motif.overlaps(21, 30));
        assert!(!motif.overlaps(0, 9));
    }

    #[test]
    fn test_read_motifs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("motifs_chr1.bed");
        let mut file = File::create(&path)?;
        writeln!(file, "10\t15\tfoo")?;
        writeln!(file)?;
        writeln!(file, "40\t42\tbar")?;
        file.flush()?;

        let motifs = read_motifs(&path)?;
        assert_eq!(
            motifs,
            vec![
                Motif::new(10, 15, Some("foo".into())),
                Motif::new(40, 42, Some("bar".into())),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_read_missing() {
        assert!(read_motifs("nowhere/motifs.bed").unwrap_err().is_not_found());
    }
}
