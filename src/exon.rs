//! Gene and exon annotations
//!
//! The annotation file is a little-endian binary stream of variable-length entries,
//! terminated by a zero length prefix (or by the end of the file):
//!
//! | Field                         | Type                          |
//! |-------------------------------|-------------------------------|
//! | header length `len`           | `i32` (0 terminates)          |
//! | header                        | `len` bytes UTF-8: `name gene chromosome strand` |
//! | `tx_start`, `tx_end`          | `i32`, `i32`                  |
//! | `cds_start`, `cds_end`        | `i32`, `i32`                  |
//! | `exon_count`                  | `i32`                         |
//! | exon ranges                   | `exon_count` × (`i32`, `i32`) |

use std::io::{self, Cursor, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ParseError, ReadError, Result};

/// Inclusive start and exclusive end of one exon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExonRange {
    pub start: i32,
    pub end: i32,
}

/// One transcript with its exon structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exon {
    /// Transcript name
    pub name: String,
    /// Gene symbol
    pub gene: String,
    pub chromosome: String,
    pub strand: String,
    pub tx_start: i32,
    pub tx_end: i32,
    pub cds_start: i32,
    pub cds_end: i32,
    pub exon_ranges: Vec<ExonRange>,
}
impl Exon {
    /// Serializes the entry in the annotation layout
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let header = format!(
            "{} {} {} {}",
            self.name, self.gene, self.chromosome, self.strand
        );
        writer.write_i32::<LittleEndian>(header.len() as i32)?;
        writer.write_all(header.as_bytes())?;
        for value in [self.tx_start, self.tx_end, self.cds_start, self.cds_end] {
            writer.write_i32::<LittleEndian>(value)?;
        }
        writer.write_i32::<LittleEndian>(self.exon_ranges.len() as i32)?;
        for range in &self.exon_ranges {
            writer.write_i32::<LittleEndian>(range.start)?;
            writer.write_i32::<LittleEndian>(range.end)?;
        }
        Ok(())
    }
}

/// Location of a gene found by [`search_gene`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneLocus {
    pub chromosome: String,
    pub tx_start: i32,
    pub tx_end: i32,
}

/// Reads one little-endian `i32`, reporting a short read as truncation at its offset
fn read_i32(cursor: &mut Cursor<&[u8]>) -> Result<i32> {
    let pos = cursor.position() as usize;
    cursor
        .read_i32::<LittleEndian>()
        .map_err(|err| truncated_at(err, pos))
}

fn truncated_at(err: io::Error, pos: usize) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::FileTruncation(pos).into()
    } else {
        err.into()
    }
}

/// Decodes every entry of an annotation buffer
pub fn parse_exons(buffer: &[u8]) -> Result<Vec<Exon>> {
    let mut cursor = Cursor::new(buffer);
    let mut exons = Vec::new();
    while (cursor.position() as usize) < buffer.len() {
        let len = read_i32(&mut cursor)?;
        if len == 0 {
            break;
        }
        let pos = cursor.position() as usize;
        let Ok(len) = usize::try_from(len) else {
            return Err(ReadError::FileTruncation(pos).into());
        };
        let Some(bytes) = buffer.get(pos..pos.saturating_add(len)) else {
            return Err(ReadError::FileTruncation(pos).into());
        };
        cursor.set_position((pos + len) as u64);
        let header = std::str::from_utf8(bytes)?;
        let fields: Vec<&str> = header.split(' ').collect();
        let [name, gene, chromosome, strand] = fields[..] else {
            return Err(ParseError::MalformedExonHeader(header.to_string()).into());
        };

        let tx_start = read_i32(&mut cursor)?;
        let tx_end = read_i32(&mut cursor)?;
        let cds_start = read_i32(&mut cursor)?;
        let cds_end = read_i32(&mut cursor)?;
        let count = read_i32(&mut cursor)?;
        let Ok(count) = usize::try_from(count) else {
            return Err(ParseError::InvalidExonCount(count).into());
        };
        let pos = cursor.position() as usize;
        if count > (buffer.len() - pos) / 8 {
            return Err(ReadError::FileTruncation(pos).into());
        }
        let exon_ranges = (0..count)
            .map(|_| {
                Ok(ExonRange {
                    start: read_i32(&mut cursor)?,
                    end: read_i32(&mut cursor)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        exons.push(Exon {
            name: name.to_string(),
            gene: gene.to_string(),
            chromosome: chromosome.to_string(),
            strand: strand.to_string(),
            tx_start,
            tx_end,
            cds_start,
            cds_end,
            exon_ranges,
        });
    }
    Ok(exons)
}

/// Reads every entry of an annotation file
pub fn read_exons<P: AsRef<Path>>(path: P) -> Result<Vec<Exon>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReadError::MissingFile(path.to_path_buf()).into());
    }
    let buffer = std::fs::read(path)?;
    parse_exons(&buffer)
}

/// Entries located on `chromosome`
pub fn exons_on<P: AsRef<Path>>(path: P, chromosome: &str) -> Result<Vec<Exon>> {
    let mut exons = read_exons(path)?;
    exons.retain(|exon| exon.chromosome == chromosome);
    Ok(exons)
}

/// First entry whose gene symbol matches `name`, ignoring case
pub fn search_gene<P: AsRef<Path>>(path: P, name: &str) -> Result<Option<GeneLocus>> {
    let exons = read_exons(path)?;
    Ok(exons
        .into_iter()
        .find(|exon| exon.gene.eq_ignore_ascii_case(name))
        .map(|exon| GeneLocus {
            chromosome: exon.chromosome,
            tx_start: exon.tx_start,
            tx_end: exon.tx_end,
        }))
}
