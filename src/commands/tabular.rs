//! Tabular score encoder (CADD-style `chrom pos score score score`).
//!
//! Each record carries K parallel scores for one position; score `k` is
//! quantized into buffer `k`, and buffer `k` is written to `<output>.k`.
//!
//! Records on chromosomes missing from the offset index are skipped until
//! the chromosome name changes. The stream ends at EOF or at the first line
//! too short to hold a record.

use std::fmt;
use std::io::BufRead;
use std::path::Path;

use log::info;

use crate::buffer::{commit_all, GenomeBuffer, StagedOutput};
use crate::config::{OffsetFormat, QuantParams};
use crate::error::{EncodeError, Result};
use crate::genome::{ChromosomeCache, ChromosomeIndex};
use crate::io::{check_readable, next_line, open_reader_or_stdin, source_label};
use crate::quantize::quantize;
use crate::streaming::buffers::DEFAULT_LINE_BUFFER;
use crate::streaming::parsing::{
    display_token, parse_f64, parse_i64_fast, trim_line_end, Tokens, MIN_TABULAR_LINE,
};

/// Number of scores per record in CADD files (one per alternate allele).
pub const DEFAULT_CHANNELS: usize = 3;

/// Column of the first score in `chrom pos score...` records.
pub const DEFAULT_SCORE_COLUMN: usize = 2;

/// Counters reported after a tabular encoding run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TabularStats {
    pub records_encoded: u64,
    pub records_skipped: u64,
    pub chromosome_switches: usize,
}

impl fmt::Display for TabularStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records_encoded={}, records_skipped={}, chromosome_switches={}",
            self.records_encoded, self.records_skipped, self.chromosome_switches
        )
    }
}

/// Tabular score encoder configuration.
#[derive(Debug, Clone)]
pub struct TabularCommand {
    pub params: QuantParams,
    pub offset_format: OffsetFormat,
    /// Parallel scores per record, one output buffer each.
    pub channels: usize,
    /// 0-based column holding the first score.
    pub score_column: usize,
}

impl TabularCommand {
    pub fn new(params: QuantParams) -> Self {
        Self {
            params,
            offset_format: OffsetFormat::default(),
            channels: DEFAULT_CHANNELS,
            score_column: DEFAULT_SCORE_COLUMN,
        }
    }

    /// Set the offset file layout (builder pattern).
    pub fn with_offset_format(mut self, format: OffsetFormat) -> Self {
        self.offset_format = format;
        self
    }

    /// Set the number of score channels (builder pattern).
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Set the column of the first score (builder pattern).
    pub fn with_score_column(mut self, column: usize) -> Self {
        self.score_column = column;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(EncodeError::Config(
                "at least one score channel is required".to_string(),
            ));
        }
        if self.score_column < 2 {
            return Err(EncodeError::Config(format!(
                "score column {} overlaps the chromosome/position columns",
                self.score_column
            )));
        }
        Ok(())
    }

    /// Encode `input` into `channels` genome buffers written to
    /// `<output>.0` .. `<output>.K-1`.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
        &self,
        genome_size: usize,
        offsets: P,
        input: Q,
        output: O,
    ) -> Result<TabularStats> {
        self.validate()?;
        let index = ChromosomeIndex::from_file(offsets, self.offset_format)?;
        let input = input.as_ref();
        check_readable(&[input])?;
        let staged = StagedOutput::create_channels(output, self.channels)?;

        let mut buffers = (0..self.channels)
            .map(|_| GenomeBuffer::zeroed(genome_size))
            .collect::<Result<Vec<_>>>()?;

        let reader = open_reader_or_stdin(input)?;
        let stats = self.encode_stream(reader, &source_label(input), &index, &mut buffers)?;

        info!("About to write everything");
        commit_all(staged, &buffers)?;
        info!("Tabular encoding: {}", stats);
        Ok(stats)
    }

    /// Core loop over one decoded tabular stream.
    pub fn encode_stream<R: BufRead>(
        &self,
        mut reader: R,
        source_name: &str,
        index: &ChromosomeIndex,
        buffers: &mut [GenomeBuffer],
    ) -> Result<TabularStats> {
        self.validate()?;
        if buffers.len() != self.channels {
            return Err(EncodeError::Config(format!(
                "{} score channels but {} buffers",
                self.channels,
                buffers.len()
            )));
        }

        let mut stats = TabularStats::default();
        let mut cache = ChromosomeCache::new(index);
        let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);
        let mut line_num = 0;

        while next_line(&mut reader, &mut buf)? {
            line_num += 1;
            let line = trim_line_end(&buf);
            if line.len() < MIN_TABULAR_LINE {
                break;
            }

            let mut tokens = Tokens::whitespace(line);
            let chrom = tokens
                .next()
                .ok_or_else(|| EncodeError::parse(source_name, line_num, "empty record"))?;
            let Some(record) = cache.resolve(chrom) else {
                stats.records_skipped += 1;
                continue;
            };

            let pos_token = tokens.next().ok_or_else(|| {
                EncodeError::parse(source_name, line_num, "missing position column")
            })?;
            let position = parse_i64_fast(pos_token).ok_or_else(|| {
                EncodeError::parse(
                    source_name,
                    line_num,
                    format!("invalid position '{}'", display_token(pos_token)),
                )
            })?;
            let absolute = record
                .absolute(position)
                .ok_or_else(|| EncodeError::PositionOverflow {
                    chrom: record.name.clone(),
                    position,
                })?;

            let mut scores = tokens.skip(self.score_column - 2);
            for (channel, buffer) in buffers.iter_mut().enumerate() {
                let token = scores.next().ok_or_else(|| {
                    EncodeError::parse(
                        source_name,
                        line_num,
                        format!("missing score column {}", self.score_column + channel),
                    )
                })?;
                let value = parse_f64(token).ok_or_else(|| {
                    EncodeError::parse(
                        source_name,
                        line_num,
                        format!("invalid score '{}'", display_token(token)),
                    )
                })?;
                let code =
                    quantize(value, &self.params).map_err(|_| EncodeError::ScoreOutOfRange {
                        chrom: record.name.clone(),
                        position,
                        value,
                        min: self.params.min(),
                        max: self.params.max(),
                    })?;
                let genome_size = buffer.len();
                buffer
                    .write(absolute, code)
                    .map_err(|_| EncodeError::PositionOutOfRange {
                        chrom: record.name.clone(),
                        position,
                        absolute,
                        genome_size,
                    })?;
            }
            stats.records_encoded += 1;
        }

        stats.chromosome_switches = cache.switches();
        Ok(stats)
    }
}
