//! Tab-separated text output for the conversion helpers.
//!
//! Positions are formatted with itoa; score text is passed through as the
//! bytes read from the input, so no float round trip ever changes a value.

use crate::error::Result;
use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use std::io::{BufWriter, Write};

/// Buffered writer for `field<TAB>field...<NEWLINE>` records.
pub struct TsvWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output)
    }

    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Write a `chrom<TAB>position<TAB>value` line.
    #[inline]
    pub fn write_position_line(&mut self, chrom: &[u8], position: i64, value: &[u8]) -> Result<()> {
        self.writer.write_all(chrom)?;
        self.writer.write_all(b"\t")?;
        self.writer
            .write_all(self.itoa_buf.format(position).as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write the given fields joined by tabs, followed by a newline.
    #[inline]
    pub fn write_fields(&mut self, fields: &[&[u8]]) -> Result<()> {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.writer.write_all(b"\t")?;
            }
            self.writer.write_all(field)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write a full line as-is with newline.
    #[inline]
    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write bytes with no delimiter or newline.
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
