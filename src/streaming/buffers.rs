//! Buffer size constants for streaming operations.
//!
//! These constants control memory usage vs I/O throughput tradeoffs.

/// Default output buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Default input buffer size (256 KB).
/// Good balance for reading decompressed score streams.
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Default line buffer capacity (4 KB), the longest line the encoders expect.
pub const DEFAULT_LINE_BUFFER: usize = 4096;

/// Largest single read issued against a reference genome stream.
pub const MAX_TRANSFER: usize = 1_200_000_000;

/// Chunk size used when ingesting a reference genome (64 MB).
pub const REFERENCE_READ_CHUNK: usize = 64 * 1024 * 1024;

/// Default upper bound on a measured reference genome (3.5 Gbp).
pub const DEFAULT_MAX_GENOME_SIZE: usize = 3_500_000_000;

/// Bytes per read call while ingesting a reference.
#[inline]
pub const fn reference_chunk(remaining: usize) -> usize {
    let chunk = if REFERENCE_READ_CHUNK < MAX_TRANSFER {
        REFERENCE_READ_CHUNK
    } else {
        MAX_TRANSFER
    };
    if remaining < chunk {
        remaining
    } else {
        chunk
    }
}
