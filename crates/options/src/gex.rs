//! Gamma exposure aggregation: per-strike GEX, gamma flip, gamma pins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::ContractAnalytics;

/// Exposure divisor floor when computing pin strength ratios.
const PIN_MEDIAN_FLOOR: f64 = 1e9;
/// Pins stronger than twice the median exposure.
const VERY_STRONG_RATIO: f64 = 2.0;
const STRONG_RATIO: f64 = 1.5;
/// At most this many pins are reported, strongest first.
const MAX_PINS: usize = 5;

/// Net dealer-signed gamma exposure at one strike.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrikeExposure {
    pub strike: f64,
    pub exposure: f64,
}

/// Pin strength classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinTier {
    VeryStrong,
    Strong,
    Moderate,
}

/// A strike with enough concentrated gamma to act as a price magnet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaPin {
    pub strike: f64,
    pub gamma_exposure: f64,
    pub distance_from_spot: f64,
    /// Exposure relative to the chain's median exposure
    pub strength: f64,
    pub tier: PinTier,
}

/// Sums signed GEX per strike, ascending by strike.
#[must_use]
pub fn exposures_by_strike(contracts: &[ContractAnalytics]) -> Vec<StrikeExposure> {
    let mut by_strike: BTreeMap<u64, (f64, f64)> = BTreeMap::new();
    for contract in contracts {
        let entry = by_strike
            .entry(contract.strike.to_bits())
            .or_insert((contract.strike, 0.0));
        entry.1 += contract.signed_gex;
    }
    by_strike
        .into_values()
        .map(|(strike, exposure)| StrikeExposure { strike, exposure })
        .collect()
}

/// Gamma flip: the first strike, ascending, where the signed exposure
/// changes sign relative to the prior strike. Falls back to the strike
/// nearest the underlying when no sign change exists.
#[must_use]
pub fn gamma_flip(exposures: &[StrikeExposure], underlying_price: f64) -> Option<f64> {
    if exposures.is_empty() {
        return None;
    }

    for pair in exposures.windows(2) {
        let prev = pair[0].exposure;
        let next = pair[1].exposure;
        if prev != 0.0 && next != 0.0 && prev.signum() != next.signum() {
            return Some(pair[1].strike);
        }
    }

    nearest_strike(exposures, underlying_price)
}

fn nearest_strike(exposures: &[StrikeExposure], underlying_price: f64) -> Option<f64> {
    exposures
        .iter()
        .min_by(|a, b| {
            let da = (a.strike - underlying_price).abs();
            let db = (b.strike - underlying_price).abs();
            da.total_cmp(&db)
        })
        .map(|e| e.strike)
}

/// Detects gamma pins: strikes whose exposure clears
/// `max(p80, 1.5 x median)`, ranked by strength. When nothing clears the
/// threshold, the strike nearest the underlying is reported as a single
/// moderate pin.
#[must_use]
pub fn detect_pins(exposures: &[StrikeExposure], underlying_price: f64) -> Vec<GammaPin> {
    if exposures.is_empty() {
        return Vec::new();
    }

    let mut values: Vec<f64> = exposures.iter().map(|e| e.exposure).collect();
    values.sort_by(f64::total_cmp);
    let med = median_of_sorted(&values);
    let p80_index = ((0.8 * values.len() as f64) as usize).saturating_sub(1);
    let p80 = values[p80_index.min(values.len() - 1)];
    let threshold = p80.max(1.5 * med);
    let strength_denominator = med.max(PIN_MEDIAN_FLOOR);

    let mut pins: Vec<GammaPin> = exposures
        .iter()
        .filter(|e| e.exposure >= threshold)
        .map(|e| {
            let strength = e.exposure / strength_denominator;
            GammaPin {
                strike: e.strike,
                gamma_exposure: e.exposure,
                distance_from_spot: e.strike - underlying_price,
                strength,
                tier: tier_for(strength),
            }
        })
        .collect();

    if pins.is_empty() {
        if let Some(strike) = nearest_strike(exposures, underlying_price) {
            if let Some(e) = exposures.iter().find(|e| e.strike == strike) {
                pins.push(GammaPin {
                    strike: e.strike,
                    gamma_exposure: e.exposure,
                    distance_from_spot: e.strike - underlying_price,
                    strength: e.exposure / strength_denominator,
                    tier: PinTier::Moderate,
                });
            }
        }
        return pins;
    }

    pins.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    pins.truncate(MAX_PINS);
    pins
}

fn tier_for(strength: f64) -> PinTier {
    if strength > VERY_STRONG_RATIO {
        PinTier::VeryStrong
    } else if strength > STRONG_RATIO {
        PinTier::Strong
    } else {
        PinTier::Moderate
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
