//! Centralized numeric sanitation.
//!
//! Every f64 that crosses an external data boundary (decimal conversion,
//! correlation, division) goes through these helpers so NaN/Inf handling
//! lives in one place instead of being scattered across the engines.

use rust_decimal::Decimal;

/// Coerces a value to a guaranteed-finite f64, substituting 0.0 for NaN/Inf.
#[must_use]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Clips a value to `[lo, hi]` after sanitation.
#[must_use]
pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    sanitize(value).clamp(lo, hi)
}

/// Converts a `Decimal` to f64, coercing failures to 0.0.
#[must_use]
pub fn decimal_to_f64(value: Decimal) -> f64 {
    sanitize(value.to_string().parse::<f64>().unwrap_or(0.0))
}

/// Sample standard deviation with a 1e-6 floor so downstream ratios never
/// blow up on flat series.
#[must_use]
pub fn safe_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 1e-6;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std.is_finite() && std > 1e-6 {
        std
    } else {
        1e-6
    }
}

/// Pearson correlation coefficient between two equal-length series.
///
/// Returns 0.0 for mismatched lengths, fewer than 2 points, or degenerate
/// variance; the result is always finite and clamped to `[-1, 1]`.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator < f64::EPSILON {
        return 0.0;
    }

    clip(covariance / denominator, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sanitize_passes_finite_values() {
        assert!((sanitize(1.5) - 1.5).abs() < f64::EPSILON);
        assert!((sanitize(-0.3) - (-0.3)).abs() < f64::EPSILON);
    }

    #[test]
    fn sanitize_coerces_nan_and_inf_to_zero() {
        assert!((sanitize(f64::NAN) - 0.0).abs() < f64::EPSILON);
        assert!((sanitize(f64::INFINITY) - 0.0).abs() < f64::EPSILON);
        assert!((sanitize(f64::NEG_INFINITY) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clip_bounds_and_sanitizes() {
        assert!((clip(15.0, -10.0, 10.0) - 10.0).abs() < f64::EPSILON);
        assert!((clip(-15.0, -10.0, 10.0) - (-10.0)).abs() < f64::EPSILON);
        assert!((clip(f64::NAN, -10.0, 10.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decimal_conversion_is_exact_enough() {
        assert!((decimal_to_f64(dec!(6397.25)) - 6397.25).abs() < 1e-9);
        assert!((decimal_to_f64(Decimal::ZERO) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn safe_std_floors_small_samples() {
        assert!((safe_std(&[]) - 1e-6).abs() < f64::EPSILON);
        assert!((safe_std(&[1.0]) - 1e-6).abs() < f64::EPSILON);
    }

    #[test]
    fn safe_std_floors_flat_series() {
        assert!((safe_std(&[3.0, 3.0, 3.0, 3.0]) - 1e-6).abs() < f64::EPSILON);
    }

    #[test]
    fn safe_std_matches_sample_std() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        // sample variance = 2.5
        assert!((safe_std(&values) - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn pearson_perfect_positive() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_perfect_negative() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y) - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_symmetric() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0, 7.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        assert!((pearson(&x, &y) - pearson(&y, &x)).abs() < 1e-12);
    }

    #[test]
    fn pearson_zero_for_degenerate_inputs() {
        assert!((pearson(&[1.0], &[2.0]) - 0.0).abs() < f64::EPSILON);
        assert!((pearson(&[1.0, 2.0], &[3.0]) - 0.0).abs() < f64::EPSILON);
        assert!((pearson(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]) - 0.0).abs() < f64::EPSILON);
    }
}
