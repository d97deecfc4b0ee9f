//! Chromosome offset index.
//!
//! Parses offset files (a header, then `chrom<sep>offset` per line, where
//! `<sep>` is a space, colon or tab) into a name-sorted table that maps a
//! chromosome to its absolute start in the flat genome coordinate space.

use std::cmp::Ordering;
use std::io::BufRead;
use std::path::Path;

use log::{debug, info, warn};

use crate::config::OffsetFormat;
use crate::error::{EncodeError, Result};
use crate::io::{next_line, open_reader};
use crate::streaming::parsing::{
    display_token, is_blank, parse_u64_fast, trim_line_end, Tokens, OFFSET_DELIMITERS,
};

/// Longest chromosome name accepted in an offset file.
pub const MAX_CHROM_NAME: usize = 255;

/// A named chromosome and its 1-based absolute start offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeRecord {
    pub name: String,
    pub offset: u64,
}

impl ChromosomeRecord {
    pub fn new(name: impl Into<String>, offset: u64) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }

    /// Absolute buffer index of a chromosome-relative position:
    /// `offset - 1 + position`, or None when that leaves the i64 range.
    #[inline]
    pub fn absolute(&self, position: i64) -> Option<i64> {
        i64::try_from(self.offset)
            .ok()?
            .checked_sub(1)?
            .checked_add(position)
    }
}

/// Immutable chromosome table sorted by name bytes.
#[derive(Debug, Clone, Default)]
pub struct ChromosomeIndex {
    records: Vec<ChromosomeRecord>,
}

impl ChromosomeIndex {
    /// Build an index from records in any order.
    ///
    /// Names are sorted with a byte-wise comparison; a duplicate name is
    /// rejected.
    pub fn from_records(mut records: Vec<ChromosomeRecord>) -> Result<Self> {
        records.sort_unstable_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        if let Some(pair) = records.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(EncodeError::DuplicateChromosome(pair[0].name.clone()));
        }
        Ok(Self { records })
    }

    /// Load an offset file (gzip transparent).
    pub fn from_file<P: AsRef<Path>>(path: P, format: OffsetFormat) -> Result<Self> {
        let reader = open_reader(path.as_ref())?;
        Self::from_reader(reader, format)
    }

    /// Parse an offset table from any buffered reader.
    ///
    /// Skips `format.header_lines` lines, then reads records until the
    /// first blank line or EOF.
    pub fn from_reader<R: BufRead>(mut reader: R, format: OffsetFormat) -> Result<Self> {
        let mut buf = Vec::with_capacity(256);
        let mut line_num = 0;

        for _ in 0..format.header_lines {
            if !next_line(&mut reader, &mut buf)? {
                break;
            }
            line_num += 1;
        }

        let mut records = Vec::new();
        while next_line(&mut reader, &mut buf)? {
            line_num += 1;
            let line = trim_line_end(&buf);
            if is_blank(line) {
                break;
            }
            let record = parse_offset_line(line, line_num)?;
            debug!(
                "Just stored {} with offset {}.",
                record.name, record.offset
            );
            records.push(record);
        }

        let index = Self::from_records(records)?;
        info!("There are {} chromosomes in the genome.", index.len());
        Ok(index)
    }

    /// Exact-match lookup by recursive binary partition. O(log n).
    pub fn lookup(&self, name: &str) -> Option<&ChromosomeRecord> {
        find_record(&self.records, name.as_bytes())
    }

    /// Records in name order.
    pub fn records(&self) -> &[ChromosomeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_offset_line(line: &[u8], line_num: usize) -> Result<ChromosomeRecord> {
    let mut tokens = Tokens::new(line, OFFSET_DELIMITERS);
    let name = tokens.next().ok_or_else(|| EncodeError::IndexParse {
        line: line_num,
        message: "missing chromosome name".to_string(),
    })?;
    let offset = tokens.next().ok_or_else(|| EncodeError::IndexParse {
        line: line_num,
        message: format!("missing offset for chromosome '{}'", display_token(name)),
    })?;

    if name.len() > MAX_CHROM_NAME {
        return Err(EncodeError::IndexParse {
            line: line_num,
            message: format!(
                "chromosome name longer than {} bytes",
                MAX_CHROM_NAME
            ),
        });
    }
    let name = std::str::from_utf8(name).map_err(|_| EncodeError::IndexParse {
        line: line_num,
        message: "chromosome name is not valid UTF-8".to_string(),
    })?;
    let offset = parse_u64_fast(offset)
        .filter(|&o| o <= i64::MAX as u64)
        .ok_or_else(|| EncodeError::IndexParse {
            line: line_num,
            message: format!("invalid offset: '{}'", display_token(offset)),
        })?;

    Ok(ChromosomeRecord::new(name, offset))
}

/// Compare the midpoint, then recurse into the half that can hold `name`.
fn find_record<'a>(records: &'a [ChromosomeRecord], name: &[u8]) -> Option<&'a ChromosomeRecord> {
    if records.is_empty() {
        return None;
    }
    let mid = records.len() / 2;
    match name.cmp(records[mid].name.as_bytes()) {
        Ordering::Equal => Some(&records[mid]),
        Ordering::Less => find_record(&records[..mid], name),
        Ordering::Greater => find_record(&records[mid + 1..], name),
    }
}

/// Remembers the last chromosome a stream switched to.
///
/// Both stream parsers see long runs of records on one chromosome; the
/// index is only consulted when the name changes. An unknown chromosome
/// is reported once per switch and resolves to `None` until the name
/// changes again.
#[derive(Debug)]
pub struct ChromosomeCache<'a> {
    index: &'a ChromosomeIndex,
    last_name: Vec<u8>,
    last: Option<&'a ChromosomeRecord>,
    switches: usize,
}

impl<'a> ChromosomeCache<'a> {
    pub fn new(index: &'a ChromosomeIndex) -> Self {
        Self {
            index,
            last_name: Vec::new(),
            last: None,
            switches: 0,
        }
    }

    /// Resolve `name`, reusing the previous answer when it did not change.
    #[inline]
    pub fn resolve(&mut self, name: &[u8]) -> Option<&'a ChromosomeRecord> {
        if self.switches > 0 && name == self.last_name.as_slice() {
            return self.last;
        }
        self.switches += 1;
        self.last_name.clear();
        self.last_name.extend_from_slice(name);
        let index = self.index;
        self.last = std::str::from_utf8(name)
            .ok()
            .and_then(|n| index.lookup(n));
        if self.last.is_none() {
            warn!("Skipping {}", display_token(name));
        }
        self.last
    }

    /// Name of the chromosome last switched to.
    pub fn current_name(&self) -> String {
        display_token(&self.last_name)
    }

    /// Number of chromosome switches seen so far.
    pub fn switches(&self) -> usize {
        self.switches
    }
}
