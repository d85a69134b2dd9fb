//! Correlation gate for leadership-informed trades.
//!
//! Stateless: each call aligns the two bar series on common timestamps,
//! measures Pearson correlation over the recent window, and decides whether
//! a trade biased by the current leader is allowed to size up, must size
//! down, or is vetoed outright. NaN-safe by construction, every numeric
//! path runs through the core sanitation helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use signal_fusion_core::numeric::pearson;
use signal_fusion_core::{BarSeries, ValidatorSettings};

use crate::engine::Instrument;

/// Risk multiplier at the correlation threshold; ramps to 1.0 at |corr| = 1.
const RISK_RAMP_FLOOR: f64 = 0.2;
/// Risk cap applied to soft-downgraded evaluations in calibration mode.
const CALIBRATION_RISK_CAP: f64 = 0.15;

/// Directional intent of the trade under validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Outcome class of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationDecision {
    /// All checks passed, trade at the computed risk multiplier.
    Pass,
    /// One or more checks failed; trade vetoed, risk forced to zero.
    HardReject,
    /// Calibration mode only: checks failed but the trade may proceed
    /// at a tightly capped risk multiplier.
    SoftDowngrade,
}

/// Result of one validation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub decision: ValidationDecision,
    pub is_valid: bool,
    /// Pearson correlation over the aligned window, in [-1, 1]
    pub correlation: f64,
    /// |correlation|, reused as the leader-strength proxy
    pub leader_strength: f64,
    pub risk_multiplier: f64,
    /// Leader hint the coherence check ran against
    pub leader: Option<Instrument>,
    /// Bias and instrument echoed for downstream audit trails
    pub bias: TradeBias,
    pub instrument: Instrument,
    /// Human-readable reasons for each failed check
    pub failures: Vec<String>,
    /// Number of aligned data points the correlation was computed over
    pub aligned_points: usize,
}

/// Validates a leadership-informed trade against cross-instrument
/// correlation.
///
/// `series_a` is the instrument being traded, `series_b` its pair.
/// `leader_hint` is the leadership engine's current leader, if any; trading
/// an instrument while the pair's other leg leads is rejected. `lookback`
/// bounds the correlation window in aligned points.
#[must_use]
pub fn validate(
    bias: TradeBias,
    instrument: Instrument,
    series_a: &BarSeries,
    series_b: &BarSeries,
    leader_hint: Option<Instrument>,
    lookback: usize,
    settings: &ValidatorSettings,
) -> ValidationResult {
    let (closes_a, closes_b) = align_closes(series_a, series_b, lookback);
    let aligned_points = closes_a.len();

    let correlation = if aligned_points < 2 {
        0.0
    } else {
        pearson(&closes_a, &closes_b)
    };
    let corr_abs = correlation.abs();
    let leader_strength = corr_abs;

    // Calibration halves every threshold so exploratory runs see more flow.
    let scale = if settings.calibration_mode { 0.5 } else { 1.0 };
    let corr_min = settings.corr_min * scale;
    let strength_min = settings.leader_strength_min * scale;
    let quality_min = settings.min_correlation_quality * scale;
    let consistency_min = settings.min_leadership_consistency * scale;

    let risk_multiplier = risk_ramp(corr_abs, corr_min);

    let mut failures = Vec::new();
    if corr_abs < corr_min {
        failures.push(format!(
            "correlation intensity {corr_abs:.3} below minimum {corr_min:.3}"
        ));
    }
    if leader_strength < strength_min {
        failures.push(format!(
            "leader strength {leader_strength:.3} below minimum {strength_min:.3}"
        ));
    }
    if corr_abs < quality_min {
        failures.push(format!(
            "correlation quality {corr_abs:.3} below minimum {quality_min:.3}"
        ));
    }
    if leader_strength < consistency_min {
        failures.push(format!(
            "leadership consistency {leader_strength:.3} below minimum {consistency_min:.3}"
        ));
    }
    if matches!(leader_hint, Some(leader) if leader != instrument) {
        failures.push(format!(
            "trading {instrument:?} against detected leader {leader_hint:?}"
        ));
    }
    if risk_multiplier > settings.max_risk_threshold {
        failures.push(format!(
            "risk multiplier {risk_multiplier:.3} above cap {:.3}",
            settings.max_risk_threshold
        ));
    }

    let (decision, is_valid, risk_multiplier) = if failures.is_empty() {
        (ValidationDecision::Pass, true, risk_multiplier)
    } else if settings.calibration_mode {
        tracing::debug!(
            ?instrument,
            ?bias,
            failures = failures.len(),
            "validation soft-downgraded in calibration mode"
        );
        (
            ValidationDecision::SoftDowngrade,
            false,
            risk_multiplier.min(CALIBRATION_RISK_CAP),
        )
    } else {
        tracing::debug!(
            ?instrument,
            ?bias,
            correlation,
            failures = failures.len(),
            "validation hard-rejected"
        );
        (ValidationDecision::HardReject, false, 0.0)
    };

    ValidationResult {
        decision,
        is_valid,
        correlation,
        leader_strength,
        risk_multiplier,
        leader: leader_hint,
        bias,
        instrument,
        failures,
        aligned_points,
    }
}

/// Risk multiplier from correlation intensity: zero below the threshold,
/// then a linear ramp from the floor to 1.0 as |corr| approaches 1.
fn risk_ramp(corr_abs: f64, corr_min: f64) -> f64 {
    if corr_abs < corr_min {
        return 0.0;
    }
    let span = 1.0 - corr_min;
    if span <= f64::EPSILON {
        return 1.0;
    }
    let ramp = RISK_RAMP_FLOOR + (1.0 - RISK_RAMP_FLOOR) * (corr_abs - corr_min) / span;
    ramp.clamp(RISK_RAMP_FLOOR, 1.0)
}

/// Aligns two series on common timestamps, drops non-finite closes, and
/// keeps the trailing `lookback` aligned pairs.
fn align_closes(
    series_a: &BarSeries,
    series_b: &BarSeries,
    lookback: usize,
) -> (Vec<f64>, Vec<f64>) {
    let b_by_ts: BTreeMap<_, _> = series_b.timestamped_closes().into_iter().collect();

    let mut aligned: Vec<(f64, f64)> = series_a
        .timestamped_closes()
        .into_iter()
        .filter_map(|(ts, close_a)| {
            let close_b = b_by_ts.get(&ts)?;
            (close_a.is_finite() && close_b.is_finite()).then_some((close_a, *close_b))
        })
        .collect();

    let skip = aligned.len().saturating_sub(lookback.max(2));
    let tail = aligned.split_off(skip);
    tail.into_iter().unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use signal_fusion_core::Bar;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 22, 15, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn series_from_closes(closes: &[f64], offset_minutes: i64) -> BarSeries {
        let mut series = BarSeries::new(1, 500);
        for (i, &close) in closes.iter().enumerate() {
            let close = Decimal::try_from(close).unwrap();
            let bar = Bar::new(
                ts(offset_minutes + i as i64),
                close,
                close + dec!(1),
                close - dec!(1),
                close,
                dec!(1000),
            )
            .unwrap();
            series.push(bar).unwrap();
        }
        series
    }

    fn correlated_pair(n: usize) -> (BarSeries, BarSeries) {
        let a: Vec<f64> = (0..n).map(|i| 6400.0 + i as f64 * 0.5).collect();
        let b: Vec<f64> = (0..n).map(|i| 23200.0 + i as f64 * 2.0).collect();
        (series_from_closes(&a, 0), series_from_closes(&b, 0))
    }

    fn uncorrelated_pair(n: usize) -> (BarSeries, BarSeries) {
        let a: Vec<f64> = (0..n).map(|i| 6400.0 + (i as f64 * 2.7).sin() * 3.0).collect();
        let b: Vec<f64> = (0..n)
            .map(|i| 23200.0 + (i as f64 * 1.3 + 0.9).cos() * 5.0)
            .collect();
        (series_from_closes(&a, 0), series_from_closes(&b, 0))
    }

    // ============================================
    // Happy Path Tests
    // ============================================

    #[test]
    fn perfectly_correlated_pair_passes() {
        let (es, nq) = correlated_pair(40);
        let result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            Some(Instrument::Es),
            30,
            &ValidatorSettings::default(),
        );

        assert_eq!(result.decision, ValidationDecision::Pass);
        assert!(result.is_valid);
        assert!(result.correlation > 0.99);
        assert!((result.risk_multiplier - 1.0).abs() < 0.05);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn risk_ramp_is_linear_above_threshold() {
        // At the threshold the ramp starts at the floor.
        assert!((risk_ramp(0.75, 0.75) - 0.2).abs() < 1e-12);
        // Halfway between threshold and 1.0: floor + half the remaining span.
        assert!((risk_ramp(0.875, 0.75) - 0.6).abs() < 1e-12);
        assert!((risk_ramp(1.0, 0.75) - 1.0).abs() < 1e-12);
        // Below the threshold: zero, not the floor.
        assert!((risk_ramp(0.74, 0.75) - 0.0).abs() < f64::EPSILON);
    }

    // ============================================
    // Rejection Tests
    // ============================================

    #[test]
    fn weak_correlation_hard_rejects_with_zero_risk() {
        let (es, nq) = uncorrelated_pair(40);
        let mut settings = ValidatorSettings::default();
        settings.corr_min = 0.15;

        let result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            None,
            30,
            &settings,
        );

        assert_eq!(result.decision, ValidationDecision::HardReject);
        assert!(!result.is_valid);
        assert!((result.risk_multiplier - 0.0).abs() < f64::EPSILON);
        assert!(!result.failures.is_empty());
    }

    #[test]
    fn trading_against_detected_leader_is_rejected() {
        let (es, nq) = correlated_pair(40);
        let result = validate(
            TradeBias::Bearish,
            Instrument::Es,
            &es,
            &nq,
            Some(Instrument::Nq),
            30,
            &ValidatorSettings::default(),
        );

        assert_eq!(result.decision, ValidationDecision::HardReject);
        assert!(result
            .failures
            .iter()
            .any(|reason| reason.contains("leader")));
    }

    #[test]
    fn missing_leader_hint_skips_coherence_check() {
        let (es, nq) = correlated_pair(40);
        let result = validate(
            TradeBias::Bullish,
            Instrument::Nq,
            &nq,
            &es,
            None,
            30,
            &ValidatorSettings::default(),
        );
        assert_eq!(result.decision, ValidationDecision::Pass);
    }

    // ============================================
    // Calibration Mode Tests
    // ============================================

    #[test]
    fn calibration_downgrades_instead_of_rejecting() {
        let (es, nq) = uncorrelated_pair(40);
        let mut settings = ValidatorSettings::default();
        settings.corr_min = 0.15;
        settings.calibration_mode = true;

        let result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            None,
            30,
            &settings,
        );

        assert_eq!(result.decision, ValidationDecision::SoftDowngrade);
        assert!(!result.is_valid);
        assert!(result.risk_multiplier <= CALIBRATION_RISK_CAP);
    }

    #[test]
    fn calibration_halves_thresholds() {
        // Moderately correlated pair: trend plus noise, |corr| around 0.5.
        let n = 40;
        let a: Vec<f64> = (0..n)
            .map(|i| 6400.0 + i as f64 * 0.3 + (i as f64 * 2.1).sin() * 4.0)
            .collect();
        let b: Vec<f64> = (0..n)
            .map(|i| 23200.0 + i as f64 * 1.2 + (i as f64 * 1.7 + 1.0).cos() * 14.0)
            .collect();
        let es = series_from_closes(&a, 0);
        let nq = series_from_closes(&b, 0);

        let strict = ValidatorSettings::default();
        let strict_result =
            validate(TradeBias::Bullish, Instrument::Es, &es, &nq, None, 30, &strict);

        let mut calibrated = strict;
        calibrated.calibration_mode = true;
        let calibrated_result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            None,
            30,
            &calibrated,
        );

        // Same data, same correlation; only the verdict softens.
        assert!(
            (strict_result.correlation - calibrated_result.correlation).abs() < f64::EPSILON
        );
        assert_ne!(calibrated_result.decision, ValidationDecision::HardReject);
    }

    // ============================================
    // Data Alignment Tests
    // ============================================

    #[test]
    fn disjoint_timestamps_yield_zero_correlation() {
        let a = series_from_closes(&[6400.0, 6401.0, 6402.0], 0);
        let b = series_from_closes(&[23200.0, 23201.0, 23202.0], 100);

        let result = validate(
            TradeBias::Neutral,
            Instrument::Es,
            &a,
            &b,
            None,
            30,
            &ValidatorSettings::default(),
        );

        assert!((result.correlation - 0.0).abs() < f64::EPSILON);
        assert_eq!(result.aligned_points, 0);
        assert_eq!(result.decision, ValidationDecision::HardReject);
    }

    #[test]
    fn partial_overlap_aligns_on_common_timestamps() {
        // b lags a by 5 minutes; only the overlap should be used.
        let a: Vec<f64> = (0..30).map(|i| 6400.0 + i as f64 * 0.5).collect();
        let b: Vec<f64> = (0..30).map(|i| 23200.0 + i as f64 * 2.0).collect();
        let series_a = series_from_closes(&a, 0);
        let series_b = series_from_closes(&b, 5);

        let result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &series_a,
            &series_b,
            None,
            30,
            &ValidatorSettings::default(),
        );

        assert_eq!(result.aligned_points, 25);
        assert!(result.correlation > 0.99);
    }

    #[test]
    fn lookback_bounds_the_window() {
        let (es, nq) = correlated_pair(100);
        let result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            None,
            10,
            &ValidatorSettings::default(),
        );
        assert_eq!(result.aligned_points, 10);
    }

    #[test]
    fn correlation_is_symmetric_in_series_order() {
        let (es, nq) = correlated_pair(40);
        let forward = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            None,
            30,
            &ValidatorSettings::default(),
        );
        let reverse = validate(
            TradeBias::Bullish,
            Instrument::Nq,
            &nq,
            &es,
            None,
            30,
            &ValidatorSettings::default(),
        );
        assert!((forward.correlation - reverse.correlation).abs() < 1e-12);
    }

    #[test]
    fn result_serializes_to_json() {
        let (es, nq) = correlated_pair(40);
        let result = validate(
            TradeBias::Bullish,
            Instrument::Es,
            &es,
            &nq,
            None,
            30,
            &ValidatorSettings::default(),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("risk_multiplier"));
    }
}
