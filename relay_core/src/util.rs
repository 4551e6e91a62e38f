//! Small numeric helpers for relay_core.
use std::time::Duration;

/// Arithmetic mean; 0 for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Convert a delay in seconds to a `Duration`.
/// - Negative, NaN, and infinite inputs map to zero.
#[inline]
pub fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

/// Round half away from zero and saturate into `i64`.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn round_to_i64(v: f64) -> i64 {
    v.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_handles_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }

    #[test]
    fn delay_rejects_garbage() {
        assert_eq!(delay_from_secs(-1.0), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::INFINITY), Duration::ZERO);
        assert_eq!(delay_from_secs(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to_i64(2.5), 3);
        assert_eq!(round_to_i64(-2.5), -3);
        assert_eq!(round_to_i64(0.49), 0);
        assert_eq!(round_to_i64(1e300), i64::MAX);
    }
}
