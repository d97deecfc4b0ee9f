//! Score quantization onto a bounded byte codebook.
//!
//! A score in `[min, max]` maps to `1 + floor(scale * (score - min))`
//! with `scale = (R - 1) / (max - min)`, so the codes run from 1 to R and
//! zero stays free to mean "no data".

use crate::config::QuantParams;

/// A score outside the declared `[min, max]` range (or NaN).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutOfRange(pub f64);

/// Map `score` to its code in `1..=R`.
///
/// `max` always maps to R, even when the product rounds just below
/// `R - 1` in floating point.
#[inline]
pub fn quantize(score: f64, params: &QuantParams) -> Result<u8, OutOfRange> {
    if !(params.min() <= score && score <= params.max()) {
        return Err(OutOfRange(score));
    }
    let levels = params.levels();
    if score == params.max() {
        return Ok(levels);
    }
    let bucket = (params.scale() * (score - params.min())).floor();
    // bucket is in [0, R - 1] here; the clamp only guards rounding at the top
    let code = 1.0 + bucket;
    Ok(code.min(levels as f64) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min: f64, max: f64, levels: u16) -> QuantParams {
        QuantParams::new(min, max, levels).unwrap()
    }

    #[test]
    fn test_concrete_value() {
        // scale = 9, 1 + floor(9 * 0.95) = 9
        assert_eq!(quantize(0.95, &params(0.0, 1.0, 10)), Ok(9));
    }

    #[test]
    fn test_boundaries_map_to_first_and_last_code() {
        let cases = [
            (0.0, 1.0, 5),
            (0.0, 1.0, 10),
            (-20.0, 30.0, 255),
            (0.1, 0.7, 7),
            (-1e-3, 1e-3, 254),
            (0.0, 99.0, 100),
            (1.0 / 3.0, 2.0 / 3.0, 33),
        ];
        for (min, max, levels) in cases {
            let p = params(min, max, levels);
            assert_eq!(quantize(min, &p), Ok(1), "min of {:?}", (min, max, levels));
            assert_eq!(
                quantize(max, &p),
                Ok(levels as u8),
                "max of {:?}",
                (min, max, levels)
            );
        }
    }

    #[test]
    fn test_monotone_and_in_range() {
        let p = params(-3.5, 12.25, 200);
        let mut prev = 0u8;
        for i in 0..=10_000 {
            let score = -3.5 + (12.25 + 3.5) * (i as f64 / 10_000.0);
            let score = score.min(12.25);
            let code = quantize(score, &p).unwrap();
            assert!(p.code_range().contains(&code));
            assert!(code >= prev, "not monotone at {}", score);
            prev = code;
        }
    }

    #[test]
    fn test_out_of_range() {
        let p = params(0.0, 100.0, 10);
        assert_eq!(quantize(150.0, &p), Err(OutOfRange(150.0)));
        assert_eq!(quantize(-0.5, &p), Err(OutOfRange(-0.5)));
        assert!(quantize(f64::NAN, &p).is_err());
    }
}
