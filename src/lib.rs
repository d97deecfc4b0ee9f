// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! genocode: dense byte encodings of genome-wide annotations
//!
//! Converts per-chromosome score tracks and interval annotations into flat
//! arrays with one byte per absolute genome position, so any base can be
//! looked up by offset.
//!
//! # Features
//!
//! - **Score quantization**: wiggle and CADD-style tabular scores mapped to
//!   codes `1..=R`, with 0 meaning "no data"
//! - **Annotation overlay**: interval sets combined per base as bit flags or
//!   saturating sums, optionally on top of encoded reference bases
//! - **Streaming I/O**: single pass over plain or gzip input
//! - **All-or-nothing output**: a failed run never leaves a partial file
//!
//! # Example
//!
//! ```rust,no_run
//! use genocode::{commands::ScoreCommand, QuantParams};
//!
//! let params = QuantParams::new(-14.0, 6.4, 255).unwrap();
//! let stats = ScoreCommand::new(params)
//!     .run(3_137_161_264, "offsets.txt", &["phyloP.wigFix.gz"], "phyloP.bin")
//!     .unwrap();
//! println!("{}", stats);
//! ```

pub mod buffer;
pub mod commands;
pub mod config;
pub mod error;
pub mod genome;
pub mod io;
pub mod quantize;
pub mod reference;
pub mod streaming;

// Re-export commonly used types
pub use buffer::GenomeBuffer;
pub use config::{OffsetFormat, OverlayMode, QuantParams, WeightReusePolicy};
pub use error::{EncodeError, Result};
pub use genome::{ChromosomeIndex, ChromosomeRecord};
pub use quantize::quantize;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::buffer::GenomeBuffer;
    pub use crate::commands::{
        AnnotateCommand, GenomeSource, ScoreCommand, TabularCommand,
    };
    pub use crate::config::{OffsetFormat, OverlayMode, QuantParams, WeightReusePolicy};
    pub use crate::error::{EncodeError, Result};
    pub use crate::genome::{ChromosomeIndex, ChromosomeRecord};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::commands::ScoreCommand;
        use crate::config::{OffsetFormat, QuantParams};
        use crate::genome::ChromosomeIndex;
        use crate::GenomeBuffer;

        let index =
            ChromosomeIndex::from_reader(&b"name offset\nchr1 1\nchr2 11\n"[..], OffsetFormat::default())
                .unwrap();
        let cmd = ScoreCommand::new(QuantParams::new(0.0, 1.0, 10).unwrap());
        let mut buffer = GenomeBuffer::zeroed(20).unwrap();
        let mut stats = Default::default();

        cmd.encode_stream(
            &b"fixedStep chrom=chr2 start=1 step=1\n0\n1\n"[..],
            "test",
            &index,
            &mut buffer,
            &mut stats,
        )
        .unwrap();

        assert_eq!(buffer.get(11), Some(1));
        assert_eq!(buffer.get(12), Some(10));
        assert_eq!(stats.values_encoded, 2);
    }
}
