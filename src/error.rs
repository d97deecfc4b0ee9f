//! Error types shared by every encoder.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building an encoded genome.
///
/// Every variant aborts the run. Conditions the encoders tolerate
/// (unknown chromosomes, suspicious annotation weights) are logged
/// instead and never surface here.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot open '{}': {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to allocate a genome buffer of {size} bytes")]
    Allocation { size: usize },

    #[error("Offset file line {line}: {message}")]
    IndexParse { line: usize, message: String },

    #[error("Chromosome '{0}' appears more than once in the offset file")]
    DuplicateChromosome(String),

    #[error("Parse error in {source_name} at line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Chromosome '{chrom}' not found in {source_name}")]
    ChromosomeNotFound { chrom: String, source_name: String },

    #[error("Found a weight of {0}, which is impossible [1..255 is the possible range]")]
    InvalidWeight(i64),

    #[error("Weight {weight} from '{path}' was already used by an earlier annotation file")]
    WeightReused { weight: u8, path: String },

    #[error("Impossible score {value} at {chrom}:{position} (declared range [{min}, {max}])")]
    ScoreOutOfRange {
        chrom: String,
        position: i64,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Impossible position {chrom}:{position} (absolute {absolute}, genome size {genome_size})")]
    PositionOutOfRange {
        chrom: String,
        position: i64,
        absolute: i64,
        genome_size: usize,
    },

    #[error("Impossible position {chrom}:{position} (outside the genome coordinate range)")]
    PositionOverflow { chrom: String, position: i64 },

    #[error("Interval start {start}, stop {stop} incompatible with genome size {genome_size}")]
    IntervalOutOfRange {
        start: i64,
        stop: i64,
        genome_size: usize,
    },

    #[error("Reference genome exceeds the maximum genome size of {limit} bytes")]
    ReferenceTooLarge { limit: usize },
}

impl EncodeError {
    /// Process exit status for this error class.
    ///
    /// Configuration, index and I/O failures exit with 1, malformed input
    /// with 2, and data outside the declared score or genome range with 3.
    pub fn exit_code(&self) -> i32 {
        match self {
            EncodeError::Io(_)
            | EncodeError::Open { .. }
            | EncodeError::Config(_)
            | EncodeError::Allocation { .. }
            | EncodeError::IndexParse { .. }
            | EncodeError::DuplicateChromosome(_) => 1,
            EncodeError::Parse { .. }
            | EncodeError::ChromosomeNotFound { .. }
            | EncodeError::InvalidWeight(_)
            | EncodeError::WeightReused { .. } => 2,
            EncodeError::ScoreOutOfRange { .. }
            | EncodeError::PositionOutOfRange { .. }
            | EncodeError::PositionOverflow { .. }
            | EncodeError::IntervalOutOfRange { .. }
            | EncodeError::ReferenceTooLarge { .. } => 3,
        }
    }

    /// Build a parse error for `source_name` at a 1-based line number.
    pub fn parse(source_name: &str, line: usize, message: impl Into<String>) -> Self {
        EncodeError::Parse {
            source_name: source_name.to_string(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EncodeError>;
