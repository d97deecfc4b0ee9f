//! Validated run parameters.
//!
//! Everything in this module is checked before a genome buffer is
//! allocated, so a bad command line never costs a multi-gigabyte
//! allocation.

use crate::error::{EncodeError, Result};
use std::fmt;
use std::ops::RangeInclusive;

/// Smallest accepted number of quantization levels.
pub const MIN_LEVELS: u16 = 5;

/// Largest accepted number of quantization levels (one byte, zero reserved).
pub const MAX_LEVELS: u16 = 255;

/// Weights that compose cleanly under bitwise OR on top of base codes 0..=4.
pub const BITWISE_WEIGHTS: [u8; 5] = [8, 16, 32, 64, 128];

/// Score range and codebook size for quantization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    min: f64,
    max: f64,
    levels: u8,
    scale: f64,
}

impl QuantParams {
    /// Validate a score range `[min, max]` mapped onto `levels` codes.
    pub fn new(min: f64, max: f64, levels: u16) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(EncodeError::Config(format!(
                "score bounds must be finite (min = {}, max = {})",
                min, max
            )));
        }
        if min >= max {
            return Err(EncodeError::Config(format!(
                "Impossible max = {}  min = {}",
                max, min
            )));
        }
        if !(max - min).is_finite() {
            return Err(EncodeError::Config(format!(
                "score range too wide (max - min overflows: min = {}, max = {})",
                min, max
            )));
        }
        if !(MIN_LEVELS..=MAX_LEVELS).contains(&levels) {
            return Err(EncodeError::Config(format!(
                "Impossible R [{}..{}] = {}",
                MIN_LEVELS, MAX_LEVELS, levels
            )));
        }
        Ok(Self {
            min,
            max,
            levels: levels as u8,
            scale: (levels - 1) as f64 / (max - min),
        })
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Number of codes (R).
    #[inline]
    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// `(R - 1) / (max - min)`
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Codes a valid score can map to. Zero is never produced.
    pub fn code_range(&self) -> RangeInclusive<u8> {
        1..=self.levels
    }
}

/// How annotation weights combine with the bytes already in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    /// `byte |= weight`; each weight is a flag tested independently by bit.
    #[default]
    Bitwise,
    /// `byte += weight` (saturating); overlapping annotations stack.
    Additive,
}

impl fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayMode::Bitwise => write!(f, "bitwise"),
            OverlayMode::Additive => write!(f, "additive"),
        }
    }
}

/// What to do when two annotation files declare the same weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightReusePolicy {
    /// Several files may describe the same annotation type.
    #[default]
    Allow,
    /// Accept the reuse but log it.
    Warn,
    /// Each annotation file must own a distinct weight.
    Error,
}

/// Layout of the chromosome offset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetFormat {
    /// Lines skipped before the first record.
    pub header_lines: usize,
}

impl Default for OffsetFormat {
    fn default() -> Self {
        Self { header_lines: 1 }
    }
}

impl OffsetFormat {
    pub fn with_header_lines(header_lines: usize) -> Self {
        Self { header_lines }
    }
}

/// True when `weight` is one of [`BITWISE_WEIGHTS`].
#[inline]
pub fn is_bitwise_weight(weight: u8) -> bool {
    BITWISE_WEIGHTS.contains(&weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quant_params_scale() {
        let params = QuantParams::new(0.0, 1.0, 10).unwrap();
        assert_eq!(params.scale(), 9.0);
        assert_eq!(params.code_range(), 1..=10);
    }

    #[test]
    fn test_quant_params_rejects_bad_range() {
        assert!(QuantParams::new(1.0, 1.0, 10).is_err());
        assert!(QuantParams::new(2.0, 1.0, 10).is_err());
        assert!(QuantParams::new(f64::NAN, 1.0, 10).is_err());
        assert!(QuantParams::new(0.0, f64::INFINITY, 10).is_err());
    }

    #[test]
    fn test_quant_params_rejects_overflowing_width() {
        let err = QuantParams::new(-1e308, 1e308, 10).unwrap_err();
        assert!(matches!(err, EncodeError::Config(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(QuantParams::new(-f64::MAX, f64::MAX, 255).is_err());
        assert!(QuantParams::new(-1e307, 1e307, 255).is_ok());
    }

    #[test]
    fn test_quant_params_level_bounds() {
        assert!(QuantParams::new(0.0, 1.0, 4).is_err());
        assert!(QuantParams::new(0.0, 1.0, 5).is_ok());
        assert!(QuantParams::new(0.0, 1.0, 255).is_ok());
        assert!(QuantParams::new(0.0, 1.0, 256).is_err());
    }

    #[test]
    fn test_bitwise_weights() {
        assert!(is_bitwise_weight(16));
        assert!(is_bitwise_weight(128));
        assert!(!is_bitwise_weight(4));
        assert!(!is_bitwise_weight(24));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OverlayMode::default(), OverlayMode::Bitwise);
        assert_eq!(WeightReusePolicy::default(), WeightReusePolicy::Allow);
        assert_eq!(OffsetFormat::default().header_lines, 1);
    }
}
