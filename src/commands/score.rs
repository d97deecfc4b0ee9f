//! Step-based (wiggle) score encoder.
//!
//! Consumes `fixedStep` / `variableStep` streams and writes quantized
//! score codes into a genome buffer.
//!
//! # Format
//!
//! ```text
//! fixedStep chrom=chr1 start=10001 step=1
//! 0.064
//! 0.058
//! variableStep chrom=chr2 span=5
//! 300701 12.5
//! ```
//!
//! A `fixedStep` header sets the cursor to `offset - 1 + start`; every
//! value under it is written `step` times and advances the cursor by
//! `step`. A `variableStep` value line carries its own position and is
//! written `span` times. Records on chromosomes missing from the offset
//! index are skipped until the next header names a known chromosome.
//!
//! The stream ends at EOF or at the first blank line.

use std::fmt;
use std::io::BufRead;
use std::path::Path;

use log::info;

use crate::buffer::{commit_all, GenomeBuffer, StagedOutput};
use crate::config::{OffsetFormat, QuantParams};
use crate::error::{EncodeError, Result};
use crate::genome::{ChromosomeCache, ChromosomeIndex, ChromosomeRecord};
use crate::io::{check_readable, next_line, open_reader_or_stdin, source_label};
use crate::quantize::quantize;
use crate::streaming::buffers::DEFAULT_LINE_BUFFER;
use crate::streaming::parsing::{
    display_token, is_blank, parse_f64, parse_i64_fast, parse_u64_fast, should_skip_line,
    split_key_value, trim_line_end, Tokens,
};

/// Which wiggle flavor a header declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Fixed,
    Variable,
}

impl StepKind {
    /// Recognize a header line by its leading marker.
    #[inline]
    pub fn of_line(line: &[u8]) -> Option<Self> {
        if line.starts_with(b"fixedStep") {
            Some(StepKind::Fixed)
        } else if line.starts_with(b"variableStep") {
            Some(StepKind::Variable)
        } else {
            None
        }
    }
}

/// A parsed wiggle header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepHeader<'a> {
    pub kind: StepKind,
    pub chrom: &'a [u8],
    /// 1-based chromosome position of the first `fixedStep` value.
    pub start: i64,
    /// Positions covered (and advanced) per `fixedStep` value.
    pub step: u64,
    /// Positions covered per `variableStep` value.
    pub span: u64,
}

impl<'a> StepHeader<'a> {
    /// Parse `key=value` pairs after the marker, in any order.
    ///
    /// Unknown keys are ignored. `chrom` is always required, `start` only
    /// for `fixedStep`.
    pub fn parse(line: &'a [u8]) -> std::result::Result<Self, String> {
        let mut tokens = Tokens::whitespace(line);
        let kind = tokens
            .next()
            .and_then(StepKind::of_line)
            .ok_or_else(|| "not a fixedStep/variableStep header".to_string())?;

        let mut chrom = None;
        let mut start = None;
        let mut step = 1;
        let mut span = 1;
        for token in tokens {
            let (key, value) = split_key_value(token)
                .ok_or_else(|| format!("malformed header field '{}'", display_token(token)))?;
            match key {
                b"chrom" => chrom = Some(value),
                b"start" => start = Some(header_number(key, value)?),
                b"step" => step = header_number(key, value)?,
                b"span" => span = header_number(key, value)?,
                _ => {}
            }
        }

        let chrom = chrom
            .filter(|c| !c.is_empty())
            .ok_or_else(|| "header is missing chrom=".to_string())?;
        let start = match (kind, start) {
            (_, Some(s)) => s as i64,
            (StepKind::Fixed, None) => return Err("fixedStep header is missing start=".into()),
            (StepKind::Variable, None) => 0,
        };
        if step == 0 || span == 0 {
            return Err("step and span must be at least 1".to_string());
        }

        Ok(Self {
            kind,
            chrom,
            start,
            step,
            span,
        })
    }
}

fn header_number(key: &[u8], value: &[u8]) -> std::result::Result<u64, String> {
    parse_u64_fast(value)
        .filter(|&v| v <= i64::MAX as u64)
        .ok_or_else(|| {
            format!(
                "invalid {}= value '{}'",
                display_token(key),
                display_token(value)
            )
        })
}

/// Parser state between lines.
#[derive(Debug, Clone, Copy)]
enum StepState<'a> {
    /// No header seen yet.
    Start,
    /// Current chromosome is not in the index.
    Skip,
    Fixed {
        record: &'a ChromosomeRecord,
        /// Chromosome-relative position of the next value.
        position: i64,
        step: u64,
    },
    Variable {
        record: &'a ChromosomeRecord,
        span: u64,
    },
}

/// Counters reported after a wiggle encoding run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScoreStats {
    pub files: usize,
    pub headers: usize,
    pub values_encoded: u64,
    pub values_skipped: u64,
    pub bases_written: u64,
}

impl fmt::Display for ScoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={}, headers={}, values_encoded={}, values_skipped={}, bases_written={}",
            self.files, self.headers, self.values_encoded, self.values_skipped, self.bases_written
        )
    }
}

/// Wiggle score encoder configuration.
#[derive(Debug, Clone)]
pub struct ScoreCommand {
    pub params: QuantParams,
    pub offset_format: OffsetFormat,
}

impl ScoreCommand {
    pub fn new(params: QuantParams) -> Self {
        Self {
            params,
            offset_format: OffsetFormat::default(),
        }
    }

    /// Set the offset file layout (builder pattern).
    pub fn with_offset_format(mut self, format: OffsetFormat) -> Self {
        self.offset_format = format;
        self
    }

    /// Encode `inputs` into a genome of `genome_size` bytes written to `output`.
    ///
    /// The index, inputs and destination are all checked before the
    /// buffer is allocated. Output only appears if every input encodes.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
        &self,
        genome_size: usize,
        offsets: P,
        inputs: &[Q],
        output: O,
    ) -> Result<ScoreStats> {
        if inputs.is_empty() {
            return Err(EncodeError::Config("no wiggle inputs given".to_string()));
        }
        let index = ChromosomeIndex::from_file(offsets, self.offset_format)?;
        check_readable(inputs)?;
        let staged = StagedOutput::create(output)?;

        let mut buffer = GenomeBuffer::zeroed(genome_size)?;
        let mut stats = ScoreStats::default();
        for input in inputs {
            let input = input.as_ref();
            let reader = open_reader_or_stdin(input)?;
            self.encode_stream(reader, &source_label(input), &index, &mut buffer, &mut stats)?;
            stats.files += 1;
        }

        commit_all(vec![staged], std::slice::from_ref(&buffer))?;
        info!("Wiggle encoding: {}", stats);
        Ok(stats)
    }

    /// Core state machine over one decoded wiggle stream.
    pub fn encode_stream<R: BufRead>(
        &self,
        mut reader: R,
        source_name: &str,
        index: &ChromosomeIndex,
        buffer: &mut GenomeBuffer,
        stats: &mut ScoreStats,
    ) -> Result<()> {
        let mut cache = ChromosomeCache::new(index);
        let mut state = StepState::Start;
        let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);
        let mut line_num = 0;

        while next_line(&mut reader, &mut buf)? {
            line_num += 1;
            let line = trim_line_end(&buf);
            if is_blank(line) {
                break;
            }
            if should_skip_line(line) {
                continue;
            }

            if let Some(kind) = StepKind::of_line(line) {
                let header = StepHeader::parse(line)
                    .map_err(|m| EncodeError::parse(source_name, line_num, m))?;
                stats.headers += 1;
                state = match cache.resolve(header.chrom) {
                    Some(record) => match kind {
                        StepKind::Fixed => StepState::Fixed {
                            record,
                            position: header.start,
                            step: header.step,
                        },
                        StepKind::Variable => StepState::Variable {
                            record,
                            span: header.span,
                        },
                    },
                    None => StepState::Skip,
                };
                continue;
            }

            match &mut state {
                StepState::Start => {
                    return Err(EncodeError::parse(
                        source_name,
                        line_num,
                        "value line before any fixedStep/variableStep header",
                    ));
                }
                StepState::Skip => {
                    stats.values_skipped += Tokens::whitespace(line).count() as u64;
                }
                StepState::Fixed {
                    record,
                    position,
                    step,
                } => {
                    for token in Tokens::whitespace(line) {
                        let value = parse_value(token, source_name, line_num)?;
                        self.write_value(buffer, *record, *position, *step, value)?;
                        *position = i64::try_from(*step)
                            .ok()
                            .and_then(|step| position.checked_add(step))
                            .ok_or_else(|| EncodeError::PositionOverflow {
                                chrom: record.name.clone(),
                                position: *position,
                            })?;
                        stats.values_encoded += 1;
                        stats.bases_written += *step;
                    }
                }
                StepState::Variable { record, span } => {
                    let mut tokens = Tokens::whitespace(line);
                    let (pos, value) = match (tokens.next(), tokens.next()) {
                        (Some(p), Some(v)) => (p, v),
                        _ => {
                            return Err(EncodeError::parse(
                                source_name,
                                line_num,
                                "variableStep line needs a position and a value",
                            ))
                        }
                    };
                    let pos = parse_i64_fast(pos).ok_or_else(|| {
                        EncodeError::parse(
                            source_name,
                            line_num,
                            format!("invalid position '{}'", display_token(pos)),
                        )
                    })?;
                    let value = parse_value(value, source_name, line_num)?;
                    self.write_value(buffer, *record, pos, *span, value)?;
                    stats.values_encoded += 1;
                    stats.bases_written += *span;
                }
            }
        }

        Ok(())
    }

    /// Quantize `value` and write it `count` times from the chromosome
    /// position `position`.
    fn write_value(
        &self,
        buffer: &mut GenomeBuffer,
        record: &ChromosomeRecord,
        position: i64,
        count: u64,
        value: f64,
    ) -> Result<()> {
        let code = quantize(value, &self.params).map_err(|_| EncodeError::ScoreOutOfRange {
            chrom: record.name.clone(),
            position,
            value,
            min: self.params.min(),
            max: self.params.max(),
        })?;
        let start = record
            .absolute(position)
            .ok_or_else(|| EncodeError::PositionOverflow {
                chrom: record.name.clone(),
                position,
            })?;
        let genome_size = buffer.len();
        buffer
            .fill(start, count as usize, code)
            .map_err(|oob| EncodeError::PositionOutOfRange {
                chrom: record.name.clone(),
                position: position.saturating_add(oob.index - start),
                absolute: oob.index,
                genome_size,
            })
    }
}

fn parse_value(token: &[u8], source_name: &str, line_num: usize) -> Result<f64> {
    parse_f64(token).ok_or_else(|| {
        EncodeError::parse(
            source_name,
            line_num,
            format!("invalid score '{}'", display_token(token)),
        )
    })
}
