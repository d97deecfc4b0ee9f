//! Split a multi-chromosome wiggle stream into one file per chromosome.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::commands::score::StepHeader;
use crate::error::{EncodeError, Result};
use crate::genome::{ChromosomeCache, ChromosomeIndex};
use crate::io::next_line;
use crate::streaming::buffers::{DEFAULT_LINE_BUFFER, DEFAULT_OUTPUT_BUFFER};
use crate::streaming::parsing::{display_token, is_blank, should_skip_line, trim_line_end};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitStats {
    pub files_written: usize,
    pub lines_written: u64,
    pub lines_skipped: u64,
}

impl fmt::Display for SplitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files_written={}, lines_written={}, lines_skipped={}",
            self.files_written, self.lines_written, self.lines_skipped
        )
    }
}

/// Path of the split file for `chrom`.
pub fn split_path(dir: &Path, chrom: &str) -> PathBuf {
    dir.join(format!("{}.wig", chrom))
}

/// Copy every header and value line of `reader` into `<dir>/<chrom>.wig`.
///
/// With an index, chromosomes it does not know are dropped (logged once per
/// switch). Only the current chromosome's file is open at a time; a
/// chromosome that reappears later in the stream is reopened in append mode.
pub fn split_wiggle<R: BufRead>(
    mut reader: R,
    source_name: &str,
    dir: &Path,
    index: Option<&ChromosomeIndex>,
) -> Result<SplitStats> {
    let mut stats = SplitStats::default();
    let mut created: FxHashSet<Vec<u8>> = FxHashSet::default();
    let mut cache = index.map(ChromosomeCache::new);
    let mut current: Option<(Vec<u8>, BufWriter<File>)> = None;
    let mut seen_header = false;
    let mut buf = Vec::with_capacity(DEFAULT_LINE_BUFFER);
    let mut line_num = 0;

    while next_line(&mut reader, &mut buf)? {
        line_num += 1;
        let line = trim_line_end(&buf);
        if is_blank(line) || should_skip_line(line) {
            continue;
        }

        if line.starts_with(b"fixedStep") || line.starts_with(b"variableStep") {
            let header = StepHeader::parse(line)
                .map_err(|msg| EncodeError::parse(source_name, line_num, msg))?;
            seen_header = true;
            let keep = match cache.as_mut() {
                Some(cache) => cache.resolve(header.chrom).is_some(),
                None => true,
            };
            let target = if keep {
                Some(checked_name(header.chrom, source_name, line_num)?)
            } else {
                None
            };
            let same = matches!(
                (&current, &target),
                (Some((open, _)), Some(next)) if open == next
            );
            if !same {
                if let Some((_, mut writer)) = current.take() {
                    writer.flush()?;
                }
                if let Some(chrom) = target {
                    let fresh = created.insert(chrom.clone());
                    let writer = open_split(dir, &chrom, fresh)?;
                    current = Some((chrom, writer));
                }
            }
        } else if !seen_header {
            return Err(EncodeError::parse(
                source_name,
                line_num,
                "value line before any fixedStep/variableStep header",
            ));
        }

        let Some((_, writer)) = current.as_mut() else {
            stats.lines_skipped += 1;
            continue;
        };
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        stats.lines_written += 1;
    }

    if let Some((_, mut writer)) = current {
        writer.flush()?;
    }
    stats.files_written = created.len();
    info!("split-wig {}: {}", source_name, stats);
    Ok(stats)
}

/// Open the split file for `chrom`, truncating it on first use.
fn open_split(dir: &Path, chrom: &[u8], fresh: bool) -> Result<BufWriter<File>> {
    let path = split_path(dir, &display_token(chrom));
    let file = if fresh {
        debug!("Creating {}", path.display());
        File::create(&path)
    } else {
        debug!("Appending to {}", path.display());
        OpenOptions::new().append(true).open(&path)
    }
    .map_err(|source| EncodeError::Open { path, source })?;
    Ok(BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, file))
}

/// Reject chromosome names that would escape the output directory.
fn checked_name(chrom: &[u8], source_name: &str, line_num: usize) -> Result<Vec<u8>> {
    if chrom.contains(&b'/') || chrom.contains(&b'\\') || chrom.starts_with(b".") {
        return Err(EncodeError::parse(
            source_name,
            line_num,
            format!("chromosome name '{}' is not a file name", display_token(chrom)),
        ));
    }
    Ok(chrom.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::ChromosomeRecord;
    use tempfile::tempdir;

    const WIG: &str = "track type=wiggle_0\n\
                       fixedStep chrom=chr1 start=1 step=1\n\
                       0.1\n\
                       0.2\n\
                       fixedStep chrom=chrUn_gl000220 start=1 step=1\n\
                       0.3\n\
                       fixedStep chrom=chr2 start=5 step=1\n\
                       0.4\n\
                       fixedStep chrom=chr1 start=100 step=1\n\
                       0.5\n";

    #[test]
    fn test_split_all_chromosomes() {
        let dir = tempdir().unwrap();
        let stats = split_wiggle(WIG.as_bytes(), "test", dir.path(), None).unwrap();

        assert_eq!(stats.files_written, 3);
        assert_eq!(
            std::fs::read_to_string(split_path(dir.path(), "chr1")).unwrap(),
            "fixedStep chrom=chr1 start=1 step=1\n0.1\n0.2\n\
             fixedStep chrom=chr1 start=100 step=1\n0.5\n"
        );
        assert_eq!(
            std::fs::read_to_string(split_path(dir.path(), "chr2")).unwrap(),
            "fixedStep chrom=chr2 start=5 step=1\n0.4\n"
        );
    }

    #[test]
    fn test_split_restricted_to_index() {
        let dir = tempdir().unwrap();
        let index = ChromosomeIndex::from_records(vec![
            ChromosomeRecord::new("chr1", 1),
            ChromosomeRecord::new("chr2", 1000),
        ])
        .unwrap();

        let stats = split_wiggle(WIG.as_bytes(), "test", dir.path(), Some(&index)).unwrap();

        assert_eq!(stats.files_written, 2);
        assert_eq!(stats.lines_skipped, 2);
        assert!(!split_path(dir.path(), "chrUn_gl000220").exists());
    }

    #[test]
    fn test_many_contigs_one_open_file() {
        let dir = tempdir().unwrap();
        let mut wig = String::new();
        for i in 0..3000 {
            wig.push_str(&format!("fixedStep chrom=scaf{} start=1 step=1\n{}\n", i, i));
        }
        wig.push_str("variableStep chrom=scaf7\n20 0.5\n");

        let stats = split_wiggle(wig.as_bytes(), "test", dir.path(), None).unwrap();

        assert_eq!(stats.files_written, 3000);
        assert_eq!(stats.lines_written, 6002);
        assert_eq!(
            std::fs::read_to_string(split_path(dir.path(), "scaf7")).unwrap(),
            "fixedStep chrom=scaf7 start=1 step=1\n7\nvariableStep chrom=scaf7\n20 0.5\n"
        );
        assert_eq!(
            std::fs::read_to_string(split_path(dir.path(), "scaf2999")).unwrap(),
            "fixedStep chrom=scaf2999 start=1 step=1\n2999\n"
        );
    }

    #[test]
    fn test_existing_file_truncated_on_first_use() {
        let dir = tempdir().unwrap();
        std::fs::write(split_path(dir.path(), "chr2"), "stale\n").unwrap();

        split_wiggle(WIG.as_bytes(), "test", dir.path(), None).unwrap();

        assert_eq!(
            std::fs::read_to_string(split_path(dir.path(), "chr2")).unwrap(),
            "fixedStep chrom=chr2 start=5 step=1\n0.4\n"
        );
    }

    #[test]
    fn test_value_before_header() {
        let dir = tempdir().unwrap();
        let err = split_wiggle(&b"0.5\n"[..], "test", dir.path(), None).unwrap_err();
        assert!(matches!(err, EncodeError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_path_like_chromosome_rejected() {
        let dir = tempdir().unwrap();
        let err = split_wiggle(
            &b"fixedStep chrom=../evil start=1 step=1\n1\n"[..],
            "test",
            dir.path(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Parse { .. }));
    }
}
