//! Encoder and conversion commands.

pub mod annotate;
pub mod convert;
pub mod score;
pub mod split;
pub mod tabular;

pub use annotate::{AnnotateCommand, GenomeSource, OverlayStats};
pub use convert::{collapse_cadd, extract_chromosome, wig_to_tsv, ConvertStats};
pub use score::{ScoreCommand, ScoreStats, StepHeader, StepKind};
pub use split::{split_wiggle, SplitStats};
pub use tabular::{TabularCommand, TabularStats};
