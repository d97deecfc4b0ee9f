//! The genome buffer: one byte per absolute genome position.
//!
//! Buffers are written through bounds-checked methods only. Output goes
//! through [`StagedOutput`], a temporary file next to the destination that
//! is renamed into place once the whole run has succeeded; a failed run
//! drops its staged files and leaves nothing behind.

use std::fmt;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::info;
use tempfile::NamedTempFile;

use crate::error::{EncodeError, Result};
use crate::streaming::buffers::{reference_chunk, DEFAULT_OUTPUT_BUFFER};

/// A write that would land outside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub index: i64,
    pub len: usize,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index {} outside genome of size {}", self.index, self.len)
    }
}

/// Zero-initialized byte array the size of the genome.
#[derive(Clone, PartialEq, Eq)]
pub struct GenomeBuffer {
    data: Vec<u8>,
}

impl fmt::Debug for GenomeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenomeBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

impl GenomeBuffer {
    /// Allocate `size` zero bytes, reporting allocation failure as an error.
    pub fn zeroed(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| EncodeError::Allocation { size })?;
        data.resize(size, 0);
        info!("Genome Size is {}", size);
        Ok(Self { data })
    }

    /// Wrap existing bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Fill a buffer from a (decoded) reference stream.
    ///
    /// Reads in bounded chunks through one scratch buffer until EOF; the
    /// number of bytes read becomes the genome size. More than `limit`
    /// bytes is an error.
    pub fn from_reader<R: Read>(mut reader: R, limit: usize) -> Result<Self> {
        let mut chunk = vec![0u8; reference_chunk(limit.saturating_add(1))];
        let mut data: Vec<u8> = Vec::new();
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n > limit - data.len() {
                return Err(EncodeError::ReferenceTooLarge { limit });
            }
            data.try_reserve(n)
                .map_err(|_| EncodeError::Allocation {
                    size: data.len() + n,
                })?;
            data.extend_from_slice(&chunk[..n]);
        }
        data.shrink_to_fit();
        info!("Genome Size is {}", data.len());
        Ok(Self { data })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Set one byte.
    #[inline]
    pub fn write(&mut self, index: i64, byte: u8) -> std::result::Result<(), OutOfBounds> {
        let i = self.check(index, 1)?;
        self.data[i] = byte;
        Ok(())
    }

    /// Write `count` copies of `byte` starting at `start`.
    ///
    /// The whole run is checked before anything is written.
    #[inline]
    pub fn fill(
        &mut self,
        start: i64,
        count: usize,
        byte: u8,
    ) -> std::result::Result<(), OutOfBounds> {
        let i = self.check(start, count)?;
        self.data[i..i + count].fill(byte);
        Ok(())
    }

    /// Apply `op` to every byte in `[start, stop]` (inclusive).
    pub fn apply_range<F: Fn(u8) -> u8>(
        &mut self,
        start: usize,
        stop: usize,
        op: F,
    ) -> std::result::Result<(), OutOfBounds> {
        if stop < start {
            return Ok(());
        }
        let i = self.check(start as i64, stop - start + 1)?;
        for byte in &mut self.data[i..=stop] {
            *byte = op(*byte);
        }
        Ok(())
    }

    /// Validate that `[start, start + count)` lies inside the buffer.
    #[inline]
    fn check(&self, start: i64, count: usize) -> std::result::Result<usize, OutOfBounds> {
        let len = self.data.len();
        let begin = usize::try_from(start).map_err(|_| OutOfBounds { index: start, len })?;
        if begin >= len {
            return Err(OutOfBounds { index: start, len });
        }
        match begin.checked_add(count) {
            Some(end) if end <= len => Ok(begin),
            _ => Err(OutOfBounds {
                index: len as i64,
                len,
            }),
        }
    }

    /// Write the buffer to `path` atomically.
    pub fn flush<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut staged = StagedOutput::create(path)?;
        staged.write_buffer(self)?;
        staged.commit()
    }

    /// Write `buffers[k]` to `<base>.k`, all or nothing.
    pub fn flush_channels<P: AsRef<Path>>(buffers: &[GenomeBuffer], base: P) -> Result<()> {
        let staged = StagedOutput::create_channels(base, buffers.len())?;
        commit_all(staged, buffers)
    }
}

/// An output file that only appears at its destination on [`commit`].
///
/// [`commit`]: StagedOutput::commit
pub struct StagedOutput {
    path: PathBuf,
    file: NamedTempFile,
}

impl StagedOutput {
    /// Create a staging file in the destination directory.
    ///
    /// Doing this before allocating a genome buffer surfaces an unwritable
    /// destination as a configuration error.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file = NamedTempFile::new_in(&dir).map_err(|e| {
            EncodeError::Config(format!("Cannot write output to '{}': {}", path.display(), e))
        })?;
        Ok(Self { path, file })
    }

    /// Stage one output per channel: `<base>.0`, `<base>.1`, ...
    pub fn create_channels<P: AsRef<Path>>(base: P, channels: usize) -> Result<Vec<Self>> {
        (0..channels)
            .map(|j| Self::create(channel_path(base.as_ref(), j)))
            .collect()
    }

    /// Final destination of this output.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dump the raw buffer bytes into the staging file.
    pub fn write_buffer(&mut self, buffer: &GenomeBuffer) -> Result<()> {
        let mut writer = BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, self.file.as_file_mut());
        writer.write_all(buffer.as_slice())?;
        writer.flush()?;
        Ok(())
    }

    /// Rename the staging file to its destination.
    pub fn commit(self) -> Result<()> {
        self.file.as_file().sync_all()?;
        self.file
            .persist(&self.path)
            .map_err(|e| EncodeError::Io(e.error))?;
        info!("Wrote {}", self.path.display());
        Ok(())
    }
}

/// `<base>.<channel>`
pub fn channel_path(base: &Path, channel: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{}", channel));
    PathBuf::from(name)
}

/// Write each buffer to its staged output, then commit them all.
pub fn commit_all(mut staged: Vec<StagedOutput>, buffers: &[GenomeBuffer]) -> Result<()> {
    if staged.len() != buffers.len() {
        return Err(EncodeError::Config(format!(
            "{} outputs staged for {} buffers",
            staged.len(),
            buffers.len()
        )));
    }
    for (out, buffer) in staged.iter_mut().zip(buffers) {
        out.write_buffer(buffer)?;
    }
    for out in staged {
        out.commit()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_zeroed() {
        let buf = GenomeBuffer::zeroed(30).unwrap();
        assert_eq!(buf.len(), 30);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_bounds() {
        let mut buf = GenomeBuffer::zeroed(10).unwrap();
        assert!(buf.write(0, 1).is_ok());
        assert!(buf.write(9, 2).is_ok());
        assert_eq!(buf.write(10, 3), Err(OutOfBounds { index: 10, len: 10 }));
        assert_eq!(buf.write(-1, 3), Err(OutOfBounds { index: -1, len: 10 }));
        assert_eq!(buf.get(0), Some(1));
        assert_eq!(buf.get(9), Some(2));
    }

    #[test]
    fn test_fill_checks_whole_run() {
        let mut buf = GenomeBuffer::zeroed(10).unwrap();
        buf.fill(2, 3, 7).unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 7, 7, 7, 0, 0, 0, 0, 0]);

        let err = buf.fill(8, 3, 9).unwrap_err();
        assert_eq!(err.index, 10);
        // Nothing written on failure
        assert_eq!(buf.get(8), Some(0));
        assert_eq!(buf.get(9), Some(0));
    }

    #[test]
    fn test_apply_range_inclusive() {
        let mut buf = GenomeBuffer::zeroed(6).unwrap();
        buf.apply_range(1, 3, |b| b | 8).unwrap();
        assert_eq!(buf.as_slice(), &[0, 8, 8, 8, 0, 0]);
        assert!(buf.apply_range(4, 6, |b| b | 8).is_err());
    }

    #[test]
    fn test_from_reader_measures_size() {
        let data = b"ACGTNacgtn".to_vec();
        let buf = GenomeBuffer::from_reader(&data[..], 100).unwrap();
        assert_eq!(buf.as_slice(), &data[..]);

        let buf = GenomeBuffer::from_reader(&data[..], data.len()).unwrap();
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_from_reader_limit() {
        let data = b"ACGTNacgtn".to_vec();
        let err = GenomeBuffer::from_reader(&data[..], 9).unwrap_err();
        assert!(matches!(err, EncodeError::ReferenceTooLarge { limit: 9 }));
    }

    /// Hands out at most `step` bytes per read, like a gzip decoder or pipe.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_from_reader_short_reads() {
        let data: Vec<u8> = (0..100_000u32).map(|i| b"ACGTN"[(i % 5) as usize]).collect();
        let reader = Trickle {
            data: &data,
            step: 7,
        };
        let buf = GenomeBuffer::from_reader(reader, data.len()).unwrap();
        assert_eq!(buf.as_slice(), &data[..]);

        let reader = Trickle {
            data: &data,
            step: 7,
        };
        let err = GenomeBuffer::from_reader(reader, data.len() - 1).unwrap_err();
        assert!(matches!(err, EncodeError::ReferenceTooLarge { .. }));
    }

    #[test]
    fn test_flush_writes_raw_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut buf = GenomeBuffer::zeroed(5).unwrap();
        buf.write(2, 9).unwrap();
        buf.flush(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 0, 9, 0, 0]);
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        {
            let mut staged = StagedOutput::create(&path).unwrap();
            staged
                .write_buffer(&GenomeBuffer::zeroed(4).unwrap())
                .unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_channel_paths() {
        assert_eq!(
            channel_path(Path::new("/tmp/cadd"), 2),
            PathBuf::from("/tmp/cadd.2")
        );
        let dir = tempdir().unwrap();
        let staged = StagedOutput::create_channels(dir.path().join("cadd"), 3).unwrap();
        let names: Vec<_> = staged.iter().map(|s| s.path().to_path_buf()).collect();
        assert_eq!(names[1], dir.path().join("cadd.1"));
    }

    #[test]
    fn test_flush_channels() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("cadd");
        let mut buffers = vec![GenomeBuffer::zeroed(3).unwrap(), GenomeBuffer::zeroed(3).unwrap()];
        buffers[1].write(1, 5).unwrap();
        GenomeBuffer::flush_channels(&buffers, &base).unwrap();
        assert_eq!(std::fs::read(dir.path().join("cadd.0")).unwrap(), vec![0, 0, 0]);
        assert_eq!(std::fs::read(dir.path().join("cadd.1")).unwrap(), vec![0, 5, 0]);
    }

    #[test]
    fn test_unwritable_destination() {
        let err = StagedOutput::create("/nonexistent-dir/out.bin").err().unwrap();
        assert!(matches!(err, EncodeError::Config(_)));
    }
}
