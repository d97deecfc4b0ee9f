//! Input and text output stream helpers.
//!
//! Score, annotation and reference files may be gzip compressed; they are
//! recognized by a `.gz` extension and decoded transparently. `-` reads
//! standard input.

use crate::error::{EncodeError, Result};
use crate::streaming::buffers::DEFAULT_INPUT_BUFFER;
use flate2::read::MultiGzDecoder;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// Open a file for reading, naming the path in the error.
pub fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| EncodeError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Get a buffered reader for either a gzip'd or plain file.
pub fn open_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = open_file(path)?;

    let inner: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::with_capacity(DEFAULT_INPUT_BUFFER, inner))
}

/// Like [`open_reader`], but `-` selects standard input.
pub fn open_reader_or_stdin(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    if path.as_os_str() == "-" {
        let stdin: Box<dyn Read> = Box::new(io::stdin());
        Ok(BufReader::with_capacity(DEFAULT_INPUT_BUFFER, stdin))
    } else {
        open_reader(path)
    }
}

/// Text output to a file, or to standard output when `path` is None or `-`.
///
/// The caller buffers; see [`TsvWriter`](crate::streaming::TsvWriter).
pub fn create_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            let file = File::create(p).map_err(|source| EncodeError::Open {
                path: p.to_path_buf(),
                source,
            })?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdout().lock())),
    }
}

/// Check that every input exists and is readable before any allocation.
pub fn check_readable<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if path.as_os_str() == "-" {
            continue;
        }
        open_file(path)?;
    }
    Ok(())
}

/// Read one line into `buf` (cleared first). Returns false at EOF.
#[inline]
pub fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool> {
    buf.clear();
    Ok(reader.read_until(b'\n', buf)? > 0)
}

/// Human-readable label for an input path.
pub fn source_label(path: &Path) -> String {
    path.display().to_string()
}
