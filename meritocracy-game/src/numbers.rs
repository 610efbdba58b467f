//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Square root that treats negative radicands from floating-point cancellation as zero.
#[must_use]
pub fn clamped_sqrt(radicand: f64) -> f64 {
    if radicand.is_nan() {
        return 0.0;
    }
    radicand.max(0.0).sqrt()
}

/// Number of groups needed to hold `count` entries in blocks of `block`.
///
/// Returns zero when `block` is zero.
#[must_use]
pub const fn blocks_needed(count: usize, block: usize) -> usize {
    if block == 0 {
        return 0;
    }
    count.div_ceil(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_convert_exactly_for_small_values() {
        assert!((usize_to_f64(0) - 0.0).abs() < f64::EPSILON);
        assert!((usize_to_f64(42) - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sqrt_clamps_cancellation_noise() {
        assert!((clamped_sqrt(-1e-12) - 0.0).abs() < f64::EPSILON);
        assert!((clamped_sqrt(f64::NAN) - 0.0).abs() < f64::EPSILON);
        assert!((clamped_sqrt(9.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn blocks_round_up() {
        assert_eq!(blocks_needed(0, 4), 0);
        assert_eq!(blocks_needed(8, 4), 2);
        assert_eq!(blocks_needed(9, 4), 3);
        assert_eq!(blocks_needed(3, 0), 0);
    }
}
