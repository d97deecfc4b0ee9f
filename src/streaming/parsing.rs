//! Zero-allocation line parsing utilities.
//!
//! Tokenizers here never mutate the line they split; each format passes
//! its own delimiter set and gets borrowed slices back.

use memchr::{memchr, memchr3};

/// Whitespace delimiters for score and interval records: space and tab.
///
/// [`Tokens`] always searches with `memchr3`, so the third slot repeats the
/// space.
pub const WHITESPACE: [u8; 3] = [b' ', b'\t', b' '];

/// Delimiters of the chromosome offset file (`chr1: 1`, `chr1\t1`, `chr1 1`).
pub const OFFSET_DELIMITERS: [u8; 3] = [b' ', b':', b'\t'];

/// Shortest line that can hold a tabular score record.
pub const MIN_TABULAR_LINE: usize = 8;

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty or contains non-digit characters.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Signed variant of [`parse_u64_fast`], accepting one leading sign.
#[inline]
pub fn parse_i64_fast(bytes: &[u8]) -> Option<i64> {
    match bytes.first()? {
        b'-' => {
            let n = parse_u64_fast(&bytes[1..])?;
            if n == i64::MAX as u64 + 1 {
                Some(i64::MIN)
            } else {
                i64::try_from(n).ok().map(|v| -v)
            }
        }
        b'+' => i64::try_from(parse_u64_fast(&bytes[1..])?).ok(),
        _ => i64::try_from(parse_u64_fast(bytes)?).ok(),
    }
}

/// Parse a decimal or scientific float.
#[inline]
pub fn parse_f64(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Strip a trailing `\n` or `\r\n`.
#[inline(always)]
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// True for an empty or whitespace-only line.
#[inline]
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Check if a wiggle line carries no data (comment or track/browser line).
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.first() == Some(&b'#') || line.starts_with(b"track") || line.starts_with(b"browser")
}

/// Split `key=value`, returning None when there is no `=`.
#[inline]
pub fn split_key_value(token: &[u8]) -> Option<(&[u8], &[u8])> {
    let eq = memchr(b'=', token)?;
    Some((&token[..eq], &token[eq + 1..]))
}

/// Non-destructive tokenizer over a delimiter set of up to three bytes.
///
/// Runs of delimiters collapse, so empty tokens are never yielded.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a [u8],
    delims: [u8; 3],
}

impl<'a> Tokens<'a> {
    #[inline]
    pub fn new(line: &'a [u8], delims: [u8; 3]) -> Self {
        Self { rest: line, delims }
    }

    /// Tokenize on spaces and tabs.
    #[inline]
    pub fn whitespace(line: &'a [u8]) -> Self {
        Self::new(line, WHITESPACE)
    }

    /// Whatever has not been tokenized yet.
    #[inline]
    pub fn remainder(&self) -> &'a [u8] {
        self.rest
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<&'a [u8]> {
        let [d1, d2, d3] = self.delims;
        loop {
            if self.rest.is_empty() {
                return None;
            }
            let end = memchr3(d1, d2, d3, self.rest).unwrap_or(self.rest.len());
            let token = &self.rest[..end];
            self.rest = if end < self.rest.len() {
                &self.rest[end + 1..]
            } else {
                &[]
            };
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
}

/// Lossy rendering of a byte token for messages.
#[inline]
pub fn display_token(token: &[u8]) -> String {
    String::from_utf8_lossy(token).into_owned()
}
