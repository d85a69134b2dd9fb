//! Implied volatility inversion via Newton-Raphson with a secant fallback.

use crate::black_scholes::{intrinsic, price, vega};
use crate::types::OptionKind;

/// Hard bounds on the solved volatility. Index options outside this band
/// are either stale quotes or data errors.
pub const IV_MIN: f64 = 0.07;
pub const IV_MAX: f64 = 0.60;

const TOLERANCE: f64 = 1e-7;
const MAX_ITERATIONS: usize = 80;
/// Below this vega a Newton step is numerically meaningless.
const VEGA_FLOOR: f64 = 1e-10;
/// Prices within this margin of intrinsic carry no extractable vol.
const INTRINSIC_EPSILON: f64 = 5e-4;
const SECANT_ITERATIONS: usize = 15;

/// Moneyness-dependent starting guess.
fn vol_hint(kind: OptionKind, s: f64, k: f64) -> f64 {
    let moneyness = s / k;
    match kind {
        OptionKind::Call => {
            if moneyness > 1.07 {
                0.18
            } else {
                0.22
            }
        }
        OptionKind::Put => {
            if moneyness < 0.93 {
                0.20
            } else {
                0.24
            }
        }
    }
}

/// Inverts Black-Scholes for the volatility implied by `target_price`.
///
/// Quotes at or below intrinsic value short-circuit to the clipped
/// moneyness hint. When vega collapses, a bounded secant iteration takes
/// over. The result is always within [`IV_MIN`, `IV_MAX`].
#[must_use]
pub fn implied_volatility(kind: OptionKind, s: f64, k: f64, t: f64, r: f64, target_price: f64) -> f64 {
    if target_price <= intrinsic(kind, s, k) + INTRINSIC_EPSILON {
        return vol_hint(kind, s, k).clamp(IV_MIN + 0.01, IV_MAX - 0.01);
    }

    let mut sigma = vol_hint(kind, s, k);

    for _ in 0..MAX_ITERATIONS {
        let diff = target_price - price(kind, s, k, t, r, sigma);
        if diff.abs() < TOLERANCE {
            break;
        }

        let v = vega(s, k, t, r, sigma);
        if v < VEGA_FLOOR {
            sigma = secant_refine(kind, s, k, t, r, target_price, sigma);
            break;
        }

        sigma = (sigma + diff / v).clamp(IV_MIN, IV_MAX);
    }

    sigma.clamp(IV_MIN, IV_MAX)
}

/// Bounded secant iteration bracketing the current estimate.
fn secant_refine(kind: OptionKind, s: f64, k: f64, t: f64, r: f64, target: f64, sigma: f64) -> f64 {
    let mut s0 = (sigma * 0.75).max(IV_MIN);
    let mut s1 = (sigma * 1.25).min(IV_MAX);
    let mut f0 = target - price(kind, s, k, t, r, s0);
    let mut f1 = target - price(kind, s, k, t, r, s1);

    for _ in 0..SECANT_ITERATIONS {
        if (f1 - f0).abs() < 1e-12 {
            break;
        }
        let s2 = (s1 - f1 * (s1 - s0) / (f1 - f0)).clamp(IV_MIN, IV_MAX);
        let f2 = target - price(kind, s, k, t, r, s2);
        s0 = s1;
        f0 = f1;
        s1 = s2;
        f1 = f2;
        if f2.abs() < TOLERANCE {
            return s2;
        }
    }

    s1
}
