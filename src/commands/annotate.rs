//! Annotation overlay: paint categorical intervals onto a genome buffer.
//!
//! An annotation list names one definition file per line. Each definition
//! file starts with its weight, followed by `start stop` pairs in absolute
//! genome coordinates (inclusive on both ends). Weights combine with the
//! existing bytes according to [`OverlayMode`].
//!
//! The buffer is either zero-filled or seeded from a reference genome whose
//! bases are replaced by their 0-4 codes, leaving bits 3-7 for weights.

use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::buffer::{commit_all, GenomeBuffer, StagedOutput};
use crate::config::{is_bitwise_weight, OverlayMode, WeightReusePolicy};
use crate::error::{EncodeError, Result};
use crate::io::{check_readable, next_line, open_reader, source_label};
use crate::reference::encode_bases;
use crate::streaming::buffers::{DEFAULT_LINE_BUFFER, DEFAULT_MAX_GENOME_SIZE};
use crate::streaming::parsing::{display_token, is_blank, parse_i64_fast, trim_line_end, Tokens};

/// Where the overlay buffer comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenomeSource {
    /// A zero-filled buffer of the given size.
    Size(usize),
    /// A reference genome string, read up to `limit` bytes.
    Reference { path: PathBuf, limit: usize },
}

impl GenomeSource {
    pub fn reference<P: Into<PathBuf>>(path: P) -> Self {
        GenomeSource::Reference {
            path: path.into(),
            limit: DEFAULT_MAX_GENOME_SIZE,
        }
    }

    fn load(&self) -> Result<GenomeBuffer> {
        match self {
            GenomeSource::Size(size) => GenomeBuffer::zeroed(*size),
            GenomeSource::Reference { path, limit } => {
                info!("Reading reference genome {}", path.display());
                let mut buffer = GenomeBuffer::from_reader(open_reader(path)?, *limit)?;
                encode_bases(buffer.as_mut_slice());
                Ok(buffer)
            }
        }
    }
}

/// Counters reported after an overlay run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OverlayStats {
    pub files: usize,
    pub intervals: u64,
    pub bases_touched: u64,
    pub weights_reused: usize,
}

impl OverlayStats {
    fn merge(&mut self, other: &OverlayStats) {
        self.files += other.files;
        self.intervals += other.intervals;
        self.bases_touched += other.bases_touched;
        self.weights_reused += other.weights_reused;
    }
}

impl fmt::Display for OverlayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={}, intervals={}, bases_touched={}, weights_reused={}",
            self.files, self.intervals, self.bases_touched, self.weights_reused
        )
    }
}

/// Annotation overlay configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotateCommand {
    pub mode: OverlayMode,
    pub reuse: WeightReusePolicy,
}

impl AnnotateCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overlay mode (builder pattern).
    pub fn with_mode(mut self, mode: OverlayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the weight reuse policy (builder pattern).
    pub fn with_reuse(mut self, reuse: WeightReusePolicy) -> Self {
        self.reuse = reuse;
        self
    }

    /// Build the buffer from `source`, apply every file named in `list`,
    /// and write the result to `output`.
    pub fn run<L: AsRef<Path>, O: AsRef<Path>>(
        &self,
        source: &GenomeSource,
        list: L,
        output: O,
    ) -> Result<OverlayStats> {
        let list = list.as_ref();
        check_readable(&[list])?;
        if let GenomeSource::Reference { path, .. } = source {
            check_readable(&[path])?;
        }
        let staged = StagedOutput::create(output)?;

        let mut buffer = source.load()?;
        let stats = self.apply_list(open_reader(list)?, &mut buffer)?;

        commit_all(vec![staged], std::slice::from_ref(&buffer))?;
        info!("Annotation overlay ({}): {}", self.mode, stats);
        Ok(stats)
    }

    /// Apply every annotation file named in a list stream.
    ///
    /// One path per line (first token); a blank line ends the list.
    pub fn apply_list<R: BufRead>(
        &self,
        mut reader: R,
        buffer: &mut GenomeBuffer,
    ) -> Result<OverlayStats> {
        let mut stats = OverlayStats::default();
        let mut used = FxHashSet::default();
        let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);

        while next_line(&mut reader, &mut buf)? {
            let line = trim_line_end(&buf);
            if is_blank(line) {
                break;
            }
            let Some(token) = Tokens::whitespace(line).next() else {
                break;
            };
            let path = PathBuf::from(String::from_utf8_lossy(token).into_owned());
            let reader = open_reader(&path)?;
            let file_stats = self.overlay(reader, &source_label(&path), buffer, &mut used)?;
            stats.merge(&file_stats);
        }
        Ok(stats)
    }

    /// Apply a single annotation definition stream.
    pub fn apply_file<R: BufRead>(
        &self,
        reader: R,
        source_name: &str,
        buffer: &mut GenomeBuffer,
    ) -> Result<OverlayStats> {
        self.overlay(reader, source_name, buffer, &mut FxHashSet::default())
    }

    fn overlay<R: BufRead>(
        &self,
        mut reader: R,
        source_name: &str,
        buffer: &mut GenomeBuffer,
        used: &mut FxHashSet<u8>,
    ) -> Result<OverlayStats> {
        let mut stats = OverlayStats {
            files: 1,
            ..Default::default()
        };
        let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);

        if !next_line(&mut reader, &mut buf)? {
            return Err(EncodeError::parse(source_name, 1, "missing weight line"));
        }
        let weight = parse_weight(trim_line_end(&buf), source_name)?;
        if self.register_weight(weight, source_name, used)? {
            stats.weights_reused += 1;
        }
        info!("Processing {} with weight {}", source_name, weight);

        let mode = self.mode;
        let op = move |byte: u8| match mode {
            OverlayMode::Bitwise => byte | weight,
            OverlayMode::Additive => byte.saturating_add(weight),
        };

        let genome_size = buffer.len();
        let mut line_num = 1;
        while next_line(&mut reader, &mut buf)? {
            line_num += 1;
            let line = trim_line_end(&buf);
            if is_blank(line) {
                break;
            }

            let (start, stop) = parse_interval(line, source_name, line_num)?;
            let bound = genome_size as i64;
            if !(0..=bound).contains(&start) || !(0..=bound).contains(&stop) {
                return Err(EncodeError::IntervalOutOfRange {
                    start,
                    stop,
                    genome_size,
                });
            }
            let (start, stop) = if stop < start {
                (stop, start)
            } else {
                (start, stop)
            };
            stats.intervals += 1;

            // `genome_size` itself passes validation but is never written
            let stop = stop.min(bound - 1);
            if stop < start {
                continue;
            }
            buffer
                .apply_range(start as usize, stop as usize, op)
                .map_err(|_| EncodeError::IntervalOutOfRange {
                    start,
                    stop,
                    genome_size,
                })?;
            stats.bases_touched += (stop - start + 1) as u64;
        }
        Ok(stats)
    }

    /// Record `weight` as used; returns true when it was already taken.
    fn register_weight(
        &self,
        weight: u8,
        source_name: &str,
        used: &mut FxHashSet<u8>,
    ) -> Result<bool> {
        if self.mode == OverlayMode::Bitwise && !is_bitwise_weight(weight) {
            warn!(
                "Found a weight of {} in {}, which is not a power of two in [8, 128]; \
                 overlapping annotations will be ambiguous",
                weight, source_name
            );
        }
        if used.insert(weight) {
            return Ok(false);
        }
        match self.reuse {
            WeightReusePolicy::Allow => {}
            WeightReusePolicy::Warn => {
                warn!("Weight {} in {} was already used", weight, source_name)
            }
            WeightReusePolicy::Error => {
                return Err(EncodeError::WeightReused {
                    weight,
                    path: source_name.to_string(),
                })
            }
        }
        Ok(true)
    }
}

fn parse_weight(line: &[u8], source_name: &str) -> Result<u8> {
    let token = Tokens::whitespace(line)
        .next()
        .ok_or_else(|| EncodeError::parse(source_name, 1, "missing weight"))?;
    let weight = parse_i64_fast(token).ok_or_else(|| {
        EncodeError::parse(
            source_name,
            1,
            format!("invalid weight '{}'", display_token(token)),
        )
    })?;
    match u8::try_from(weight) {
        Ok(w) if w > 0 => Ok(w),
        _ => Err(EncodeError::InvalidWeight(weight)),
    }
}

fn parse_interval(line: &[u8], source_name: &str, line_num: usize) -> Result<(i64, i64)> {
    let mut tokens = Tokens::whitespace(line);
    let mut coordinate = |what: &str| -> Result<i64> {
        let token = tokens.next().ok_or_else(|| {
            EncodeError::parse(source_name, line_num, format!("missing {} coordinate", what))
        })?;
        parse_i64_fast(token).ok_or_else(|| {
            EncodeError::parse(
                source_name,
                line_num,
                format!("invalid {} coordinate '{}'", what, display_token(token)),
            )
        })
    };
    let start = coordinate("start")?;
    let stop = coordinate("stop")?;
    Ok((start, stop))
}
