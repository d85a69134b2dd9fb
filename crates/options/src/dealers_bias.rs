//! Dealer's Bias: a six-component composite summarizing how option
//! positioning tilts dealer hedging flow.
//!
//! Each component maps a raw chain statistic to [0, 1] with 0.5 neutral;
//! the weighted blend is rescaled to [-1, 1]. Weights are empirically
//! tuned defaults, not protocol constants.

use serde::{Deserialize, Serialize};

use signal_fusion_core::numeric::clip;

/// Tanh scale for normalized GEX, in per-million units.
const GEX_TANH_SCALE: f64 = 300.0;
/// Tanh scale for distance-to-flip, in index points.
const FLIP_TANH_SCALE: f64 = 150.0;
/// VIX level treated as neutral.
const VIX_NEUTRAL: f64 = 20.0;

/// Component weights for the composite. The defaults are the empirically
/// tuned values; they are tunable, not protocol constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiasWeights {
    pub pcr: f64,
    pub skew: f64,
    pub gex: f64,
    pub gamma_flip: f64,
    pub vix: f64,
    pub pins: f64,
}

impl Default for BiasWeights {
    fn default() -> Self {
        Self {
            pcr: 0.35,
            skew: 0.30,
            gex: 0.20,
            gamma_flip: 0.10,
            vix: 0.03,
            pins: 0.02,
        }
    }
}

/// Direction label at the +-0.3 boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiasDirection {
    Bullish,
    Bearish,
    Neutral,
}

/// Strength label: strong beyond +-0.6, weak inside the neutral band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiasStrength {
    Strong,
    Moderate,
    Weak,
}

/// Raw chain statistics feeding the composite.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiasInputs {
    /// Put/call ratio by open interest
    pub pcr_oi: f64,
    /// Average put IV minus average call IV
    pub iv_skew: f64,
    /// Total signed GEX in per-million units
    pub gex_normalized: f64,
    /// Gamma flip strike minus underlying, when a flip exists
    pub flip_distance: Option<f64>,
    /// Volatility index level, when available
    pub vix: Option<f64>,
    /// Mean pin strength across detected pins, when any exist
    pub avg_pin_strength: Option<f64>,
}

/// The six component scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiasComponents {
    pub pcr: f64,
    pub skew: f64,
    pub gex: f64,
    pub gamma_flip: f64,
    pub vix: f64,
    pub pins: f64,
}

/// The composite bias with its interpretation labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DealersBias {
    /// Weighted blend in [0, 1], 0.5 neutral
    pub raw: f64,
    /// Rescaled composite in [-1, 1]
    pub score: f64,
    pub components: BiasComponents,
    pub direction: BiasDirection,
    pub strength: BiasStrength,
}

/// Computes the composite from raw chain statistics using the default
/// weights.
#[must_use]
pub fn compute(inputs: &BiasInputs) -> DealersBias {
    compute_weighted(inputs, &BiasWeights::default())
}

/// Computes the composite with explicit component weights.
#[must_use]
pub fn compute_weighted(inputs: &BiasInputs, weights: &BiasWeights) -> DealersBias {
    // PCR above 1 means put-heavy positioning, bearish.
    let pcr = 1.0 - inputs.pcr_oi.min(2.0) / 2.0;

    // Positive skew (puts richer) reads bullish for dealer flow.
    let skew = clip(0.5 + inputs.iv_skew * 10.0, 0.0, 1.0);

    let gex = clip(
        0.5 + 0.5 * (inputs.gex_normalized / GEX_TANH_SCALE).tanh(),
        0.0,
        1.0,
    );

    let gamma_flip = match inputs.flip_distance {
        Some(distance) => clip(0.5 + 0.5 * (distance / FLIP_TANH_SCALE).tanh(), 0.0, 1.0),
        None => 0.5,
    };

    let vix = match inputs.vix {
        Some(level) => clip(0.5 + (level - VIX_NEUTRAL) / 40.0, 0.0, 1.0),
        None => 0.5,
    };

    let pins = match inputs.avg_pin_strength {
        Some(strength) => (strength / 10.0).min(1.0).max(0.0),
        None => 0.5,
    };

    let raw = clip(
        pcr * weights.pcr
            + skew * weights.skew
            + gex * weights.gex
            + gamma_flip * weights.gamma_flip
            + vix * weights.vix
            + pins * weights.pins,
        0.0,
        1.0,
    );

    let score = ((raw - 0.5) * 2.0).clamp(-1.0, 1.0);

    let (direction, strength) = if score > 0.3 {
        (
            BiasDirection::Bullish,
            if score > 0.6 {
                BiasStrength::Strong
            } else {
                BiasStrength::Moderate
            },
        )
    } else if score < -0.3 {
        (
            BiasDirection::Bearish,
            if score < -0.6 {
                BiasStrength::Strong
            } else {
                BiasStrength::Moderate
            },
        )
    } else {
        (BiasDirection::Neutral, BiasStrength::Weak)
    };

    DealersBias {
        raw,
        score,
        components: BiasComponents {
            pcr,
            skew,
            gex,
            gamma_flip,
            vix,
            pins,
        },
        direction,
        strength,
    }
}
