//! Black-Scholes pricing and Greeks for European index options.

use serde::{Deserialize, Serialize};

use crate::types::OptionKind;

/// Volatility floor applied before Greek evaluation. Index options rarely
/// trade below 8% vol; anything lower produces aberrant Greeks.
pub const SIGMA_FLOOR: f64 = 0.08;
/// Below this sigma the gamma is additionally capped to avoid GEX blow-up.
const GAMMA_CAP_SIGMA: f64 = 0.055;
const GAMMA_CAP: f64 = 0.01;

/// First-order sensitivities of one contract.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// Standard normal CDF approximation.
#[must_use]
pub fn standard_normal_cdf(x: f64) -> f64 {
    if x < 0.0 {
        return 1.0 - standard_normal_cdf(-x);
    }

    let b1 = 0.319_381_530;
    let b2 = -0.356_563_782;
    let b3 = 1.781_477_937;
    let b4 = -1.821_255_978;
    let b5 = 1.330_274_429;
    let p = 0.231_641_9;

    let t = 1.0 / (1.0 + p * x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let pdf = (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt();
    1.0 - pdf * (b1 * t + b2 * t2 + b3 * t3 + b4 * t4 + b5 * t5)
}

/// Standard normal PDF.
#[must_use]
pub fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn d1(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Black-Scholes price of a European option.
#[must_use]
pub fn price(kind: OptionKind, s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    let d1 = d1(s, k, t, r, sigma);
    let d2 = d1 - sigma * t.sqrt();
    match kind {
        OptionKind::Call => s * standard_normal_cdf(d1) - k * (-r * t).exp() * standard_normal_cdf(d2),
        OptionKind::Put => {
            k * (-r * t).exp() * standard_normal_cdf(-d2) - s * standard_normal_cdf(-d1)
        }
    }
}

/// Black-Scholes vega (identical for calls and puts).
#[must_use]
pub fn vega(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    s * standard_normal_pdf(d1(s, k, t, r, sigma)) * t.sqrt()
}

/// Intrinsic value at spot.
#[must_use]
pub fn intrinsic(kind: OptionKind, s: f64, k: f64) -> f64 {
    match kind {
        OptionKind::Call => (s - k).max(0.0),
        OptionKind::Put => (k - s).max(0.0),
    }
}

/// Greeks for a contract, with the sigma floor and low-vol gamma cap
/// applied.
#[must_use]
pub fn greeks(kind: OptionKind, s: f64, k: f64, t: f64, r: f64, sigma: f64) -> Greeks {
    let raw_sigma = sigma;
    let sigma = sigma.max(SIGMA_FLOOR);

    let d1 = d1(s, k, t, r, sigma);
    let d2 = d1 - sigma * t.sqrt();

    let delta = match kind {
        OptionKind::Call => standard_normal_cdf(d1),
        OptionKind::Put => standard_normal_cdf(d1) - 1.0,
    };

    let mut gamma = standard_normal_pdf(d1) / (s * sigma * t.sqrt());
    if raw_sigma <= GAMMA_CAP_SIGMA {
        gamma = gamma.min(GAMMA_CAP);
    }

    let theta_decay = -s * standard_normal_pdf(d1) * sigma / (2.0 * t.sqrt());
    let theta = match kind {
        OptionKind::Call => theta_decay - r * k * (-r * t).exp() * standard_normal_cdf(d2),
        OptionKind::Put => theta_decay + r * k * (-r * t).exp() * standard_normal_cdf(-d2),
    };

    let vega = s * standard_normal_pdf(d1) * t.sqrt();

    Greeks {
        delta,
        gamma,
        theta,
        vega,
    }
}
