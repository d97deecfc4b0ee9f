//! Line-oriented streaming utilities shared by every encoder.
//!
//! - Zero-allocation tokenizing and number parsing
//! - Buffer size constants
//! - Tab-separated output formatting

pub mod buffers;
pub mod output;
pub mod parsing;

pub use output::TsvWriter;
pub use parsing::{parse_u64_fast, should_skip_line, Tokens};
