//! Text conversions that prepare score files for the encoders.
//!
//! - [`wig_to_tsv`]: expand a wiggle stream into `chrom pos value` lines.
//! - [`collapse_cadd`]: fold per-allele CADD rows into one row per position,
//!   the layout [`TabularCommand`](super::TabularCommand) reads with
//!   `score_column = 3`.
//! - [`extract_chromosome`]: copy one chromosome out of a multi-FASTA file,
//!   optionally as the bare sequence string
//!   [`AnnotateCommand`](super::AnnotateCommand) takes as a reference.

use std::fmt;
use std::io::{BufRead, Write};

use log::{debug, info};

use crate::commands::score::{StepHeader, StepKind};
use crate::error::{EncodeError, Result};
use crate::io::next_line;
use crate::streaming::buffers::DEFAULT_LINE_BUFFER;
use crate::streaming::output::TsvWriter;
use crate::streaming::parsing::{
    display_token, is_blank, parse_i64_fast, should_skip_line, trim_line_end, Tokens,
};

/// Header lines at the top of a CADD whole-genome table.
pub const CADD_HEADER_LINES: usize = 2;

/// Per-allele rows folded into one output row.
pub const CADD_ALLELES: usize = 3;

/// 0-based column of the PHRED-scaled score in CADD rows.
pub const CADD_PHRED_COLUMN: usize = 5;

/// Line counts for a conversion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvertStats {
    pub lines_read: u64,
    pub records_written: u64,
}

impl fmt::Display for ConvertStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines_read={}, records_written={}",
            self.lines_read, self.records_written
        )
    }
}

/// Rewrite a wiggle stream as tab-separated `chrom position value` lines.
///
/// Under `fixedStep` the position starts at `start` and advances by `step`
/// after every value. Under `variableStep` each line already carries its
/// position. Value text is copied verbatim.
pub fn wig_to_tsv<R: BufRead, W: Write>(
    mut reader: R,
    source_name: &str,
    output: W,
) -> Result<ConvertStats> {
    let mut writer = TsvWriter::new(output);
    let mut stats = ConvertStats::default();
    let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);
    let mut chrom: Vec<u8> = Vec::new();
    let mut kind = None;
    let mut position: Option<i64> = None;
    let mut step: u64 = 1;
    let mut line_num = 0;

    while next_line(&mut reader, &mut buf)? {
        line_num += 1;
        stats.lines_read += 1;
        let line = trim_line_end(&buf);
        if is_blank(line) {
            break;
        }
        if should_skip_line(line) {
            continue;
        }

        if StepKind::of_line(line).is_some() {
            let header = StepHeader::parse(line)
                .map_err(|msg| EncodeError::parse(source_name, line_num, msg))?;
            chrom.clear();
            chrom.extend_from_slice(header.chrom);
            kind = Some(header.kind);
            position = Some(header.start);
            step = header.step;
            continue;
        }

        match kind {
            None => {
                return Err(EncodeError::parse(
                    source_name,
                    line_num,
                    "value line before any fixedStep/variableStep header",
                ))
            }
            Some(StepKind::Fixed) => {
                for value in Tokens::whitespace(line) {
                    let Some(pos) = position else {
                        return Err(EncodeError::parse(
                            source_name,
                            line_num,
                            "fixedStep position overflows a 64-bit coordinate",
                        ));
                    };
                    writer.write_position_line(&chrom, pos, value)?;
                    stats.records_written += 1;
                    position = i64::try_from(step).ok().and_then(|s| pos.checked_add(s));
                }
            }
            Some(StepKind::Variable) => {
                let mut tokens = Tokens::whitespace(line);
                let (Some(pos), Some(value)) = (tokens.next(), tokens.next()) else {
                    return Err(EncodeError::parse(
                        source_name,
                        line_num,
                        "variableStep line needs a position and a value",
                    ));
                };
                let pos = parse_i64_fast(pos).ok_or_else(|| {
                    EncodeError::parse(
                        source_name,
                        line_num,
                        format!("invalid position '{}'", display_token(pos)),
                    )
                })?;
                writer.write_position_line(&chrom, pos, value)?;
                stats.records_written += 1;
            }
        }
    }

    writer.flush()?;
    info!("wig-to-tsv {}: {}", source_name, stats);
    Ok(stats)
}

/// Fold each run of three per-allele CADD rows into
/// `chrom pos ref phred_1 phred_2 phred_3`.
///
/// The first two lines are headers. All rows of a triple must agree on
/// chromosome and position, and the input must end on a complete triple.
pub fn collapse_cadd<R: BufRead, W: Write>(
    mut reader: R,
    source_name: &str,
    output: W,
) -> Result<ConvertStats> {
    let mut writer = TsvWriter::new(output);
    let mut stats = ConvertStats::default();
    let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);

    for _ in 0..CADD_HEADER_LINES {
        if !next_line(&mut reader, &mut buf)? {
            break;
        }
        stats.lines_read += 1;
    }

    // chrom, pos, ref, then one PHRED score per allele
    let mut site: Vec<Vec<u8>> = Vec::with_capacity(3 + CADD_ALLELES);
    let mut line_num = CADD_HEADER_LINES;

    while next_line(&mut reader, &mut buf)? {
        line_num += 1;
        stats.lines_read += 1;
        let line = trim_line_end(&buf);
        if is_blank(line) {
            continue;
        }

        let fields: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();
        let Some(&phred) = fields.get(CADD_PHRED_COLUMN) else {
            return Err(EncodeError::parse(
                source_name,
                line_num,
                format!(
                    "expected at least {} columns, found {}",
                    CADD_PHRED_COLUMN + 1,
                    fields.len()
                ),
            ));
        };

        if site.is_empty() {
            site.extend(fields[..3].iter().map(|f| f.to_vec()));
        } else if site[0] != fields[0] || site[1] != fields[1] {
            return Err(EncodeError::parse(
                source_name,
                line_num,
                format!(
                    "expected another allele of {}:{}, found {}:{}",
                    display_token(&site[0]),
                    display_token(&site[1]),
                    display_token(fields[0]),
                    display_token(fields[1])
                ),
            ));
        }
        site.push(phred.to_vec());

        if site.len() == 3 + CADD_ALLELES {
            let row: Vec<&[u8]> = site.iter().map(Vec::as_slice).collect();
            writer.write_fields(&row)?;
            stats.records_written += 1;
            site.clear();
        }
    }

    if !site.is_empty() {
        return Err(EncodeError::parse(
            source_name,
            line_num,
            format!(
                "incomplete allele triple for {}:{}",
                display_token(&site[0]),
                display_token(&site[1])
            ),
        ));
    }

    writer.flush()?;
    info!("collapse-cadd {}: {}", source_name, stats);
    Ok(stats)
}

/// Copy the record of `chrom` out of a multi-FASTA stream.
///
/// The record starts at the first header whose name (the text after `>` up
/// to the first space or tab) equals `chrom`, and ends before the next
/// header. With `sequence_only` the header and line breaks are dropped,
/// leaving one uninterrupted sequence string.
pub fn extract_chromosome<R: BufRead, W: Write>(
    mut reader: R,
    source_name: &str,
    chrom: &str,
    output: W,
    sequence_only: bool,
) -> Result<ConvertStats> {
    let mut writer = TsvWriter::new(output);
    let mut stats = ConvertStats::default();
    let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);
    let mut found = false;

    while next_line(&mut reader, &mut buf)? {
        stats.lines_read += 1;
        let line = trim_line_end(&buf);

        if let Some(header) = line.strip_prefix(b">") {
            if found {
                break;
            }
            if Tokens::whitespace(header).next() == Some(chrom.as_bytes()) {
                debug!("Found {} at line {}", chrom, stats.lines_read);
                found = true;
                if !sequence_only {
                    writer.write_line(line)?;
                }
            }
            continue;
        }
        if !found {
            continue;
        }

        if sequence_only {
            writer.write_raw(line)?;
        } else {
            writer.write_line(line)?;
        }
        stats.records_written += 1;
    }

    if !found {
        return Err(EncodeError::ChromosomeNotFound {
            chrom: chrom.to_string(),
            source_name: source_name.to_string(),
        });
    }

    writer.flush()?;
    info!("extract-fasta {} {}: {}", source_name, chrom, stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_wig(input: &str) -> Result<String> {
        let mut out = Vec::new();
        wig_to_tsv(input.as_bytes(), "test", &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn convert_cadd(input: &str) -> Result<String> {
        let mut out = Vec::new();
        collapse_cadd(input.as_bytes(), "test", &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_fixed_step_positions() {
        let out = convert_wig(
            "fixedStep chrom=chr1 start=10 step=2\n0.1\n0.2\n\
             fixedStep chrom=chr2 start=1 step=1\n-1.5\n",
        )
        .unwrap();
        assert_eq!(out, "chr1\t10\t0.1\nchr1\t12\t0.2\nchr2\t1\t-1.5\n");
    }

    #[test]
    fn test_variable_step_positions() {
        let out = convert_wig("track type=wiggle_0\nvariableStep chrom=chrX\n500 3\n900 4\n").unwrap();
        assert_eq!(out, "chrX\t500\t3\nchrX\t900\t4\n");
    }

    #[test]
    fn test_fixed_step_position_overflow() {
        let err = convert_wig("fixedStep chrom=chr1 start=9223372036854775807 step=1\n1\n2\n")
            .unwrap_err();
        assert!(matches!(err, EncodeError::Parse { line: 3, .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_value_before_header() {
        let err = convert_wig("0.5\n").unwrap_err();
        assert!(matches!(err, EncodeError::Parse { line: 1, .. }));
    }

    const FASTA: &str = ">chr1 AC:CM000663.2\n\
                         ACGT\n\
                         NNac\n\
                         >chr10\n\
                         GGGG\n\
                         >chr2\n\
                         TTTT\n\
                         CC\n";

    fn extract(chrom: &str, sequence_only: bool) -> Result<(String, ConvertStats)> {
        let mut out = Vec::new();
        let stats = extract_chromosome(FASTA.as_bytes(), "test", chrom, &mut out, sequence_only)?;
        Ok((String::from_utf8(out).unwrap(), stats))
    }

    #[test]
    fn test_extract_chromosome() {
        let (out, stats) = extract("chr1", false).unwrap();
        assert_eq!(out, ">chr1 AC:CM000663.2\nACGT\nNNac\n");
        assert_eq!(stats.records_written, 2);

        let (out, _) = extract("chr2", false).unwrap();
        assert_eq!(out, ">chr2\nTTTT\nCC\n");
    }

    #[test]
    fn test_extract_stops_at_next_header() {
        let (out, stats) = extract("chr10", false).unwrap();
        assert_eq!(out, ">chr10\nGGGG\n");
        // reading stops on the chr2 header
        assert_eq!(stats.lines_read, 6);
    }

    #[test]
    fn test_extract_sequence_only() {
        let (out, _) = extract("chr1", true).unwrap();
        assert_eq!(out, "ACGTNNac");
    }

    #[test]
    fn test_extract_missing_chromosome() {
        let err = extract("chr3", false).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::ChromosomeNotFound { ref chrom, .. } if chrom == "chr3"
        ));
        assert_eq!(err.exit_code(), 2);
        // a name prefix is not a match
        assert!(extract("chr", false).is_err());
    }

    #[test]
    fn test_collapse_cadd() {
        let input = "## CADD GRCh37-v1.0\n\
                     #Chrom\tPos\tRef\tAlt\tRawScore\tPHRED\n\
                     1\t10001\tT\tA\t0.69\t8.1\n\
                     1\t10001\tT\tC\t0.55\t7.0\n\
                     1\t10001\tT\tG\t0.61\t7.5\n\
                     1\t10002\tA\tC\t0.7\t8.2\n\
                     1\t10002\tA\tG\t0.6\t7.6\n\
                     1\t10002\tA\tT\t0.5\t6.9\n";
        let out = convert_cadd(input).unwrap();
        assert_eq!(
            out,
            "1\t10001\tT\t8.1\t7.0\t7.5\n1\t10002\tA\t8.2\t7.6\t6.9\n"
        );
    }

    #[test]
    fn test_collapse_cadd_mismatched_triple() {
        let input = "#h\n#h\n\
                     1\t10001\tT\tA\t0.69\t8.1\n\
                     1\t10002\tA\tC\t0.7\t8.2\n";
        let err = convert_cadd(input).unwrap_err();
        assert!(matches!(err, EncodeError::Parse { line: 4, .. }));
    }

    #[test]
    fn test_collapse_cadd_incomplete_triple() {
        let input = "#h\n#h\n\
                     1\t10001\tT\tA\t0.69\t8.1\n\
                     1\t10001\tT\tC\t0.55\t7.0\n";
        assert!(matches!(
            convert_cadd(input).unwrap_err(),
            EncodeError::Parse { .. }
        ));
    }

    #[test]
    fn test_collapse_cadd_short_row() {
        let input = "#h\n#h\n1\t10001\tT\n";
        assert!(matches!(
            convert_cadd(input).unwrap_err(),
            EncodeError::Parse { line: 3, .. }
        ));
    }
}
