//! Options chain analytics for the signal fusion engine.
//!
//! [`analyze`] takes a raw [`OptionChainSnapshot`], filters unusable
//! quotes, inverts each mid price to an implied volatility, evaluates
//! Black-Scholes Greeks, and aggregates chain-level structure: gamma
//! exposure per strike, the gamma flip, max pain, gamma pins, and the
//! Dealer's Bias composite.

pub mod black_scholes;
pub mod dealers_bias;
pub mod gex;
pub mod implied_vol;
pub mod max_pain;
pub mod types;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use signal_fusion_core::AnalyticsError;

pub use black_scholes::Greeks;
pub use dealers_bias::{BiasComponents, BiasDirection, BiasStrength, BiasWeights, DealersBias};
pub use gex::{GammaPin, PinTier, StrikeExposure};
pub use types::{ContractAnalytics, DealerSign, OptionChainSnapshot, OptionKind, OptionQuote};

use dealers_bias::BiasInputs;

/// Contract multiplier for index options.
const CONTRACT_MULTIPLIER: f64 = 100.0;
/// GEX normalization divisor: per-million units.
const GEX_NORMALIZATION: f64 = 1e6;

/// Chain-level summary statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainSummary {
    /// Put/call ratio by open interest; 0 when the chain has no call OI
    pub pcr_oi: f64,
    /// Put/call ratio by traded volume; 0 when the chain has no call volume
    pub pcr_volume: f64,
    pub avg_iv: f64,
    /// Average put IV minus average call IV
    pub iv_skew: f64,
    pub gex_total_signed: f64,
    /// Signed GEX in per-million units
    pub gex_normalized: f64,
}

/// Full result of one chain analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainAnalysis {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub underlying_price: f64,
    pub contracts: Vec<ContractAnalytics>,
    pub summary: ChainSummary,
    pub exposures: Vec<StrikeExposure>,
    pub gamma_flip_strike: Option<f64>,
    pub max_pain_strike: Option<f64>,
    pub pins: Vec<GammaPin>,
    pub dealers_bias: DealersBias,
}

/// Analyzes a chain snapshot end to end.
///
/// Unusable quotes are dropped silently; a chain with no usable quote at
/// all is an error, as is a non-positive underlying price. Numerical
/// trouble inside any single contract is absorbed by the bounded IV solver
/// and the Greek caps, never propagated.
pub fn analyze(
    snapshot: &OptionChainSnapshot,
    dealer_sign: DealerSign,
    now: DateTime<Utc>,
) -> Result<ChainAnalysis, AnalyticsError> {
    let s = snapshot.underlying_price;
    let risk_free_rate = snapshot.risk_free_rate;
    if !s.is_finite() || s <= 0.0 {
        return Err(AnalyticsError::BadUnderlyingPrice(s));
    }
    if snapshot.quotes.is_empty() {
        return Err(AnalyticsError::EmptyChain);
    }

    let usable: Vec<&OptionQuote> = snapshot.quotes.iter().filter(|q| q.is_usable()).collect();
    if usable.is_empty() {
        return Err(AnalyticsError::NoUsableQuotes);
    }
    if usable.len() < snapshot.quotes.len() {
        tracing::warn!(
            symbol = %snapshot.symbol,
            dropped = snapshot.quotes.len() - usable.len(),
            kept = usable.len(),
            "dropped unusable option quotes"
        );
    }

    let contracts: Vec<ContractAnalytics> = usable
        .iter()
        .map(|quote| {
            let t = types::time_to_expiry_years(quote.expiry, now);
            let mid = quote.mid();
            let iv = implied_vol::implied_volatility(
                quote.kind,
                s,
                quote.strike,
                t,
                risk_free_rate,
                mid,
            );
            let greeks = black_scholes::greeks(quote.kind, s, quote.strike, t, risk_free_rate, iv);
            let signed_gex = greeks.gamma
                * s
                * s
                * quote.open_interest
                * CONTRACT_MULTIPLIER
                * dealer_sign.for_kind(quote.kind);
            ContractAnalytics {
                strike: quote.strike,
                kind: quote.kind,
                mid,
                implied_vol: iv,
                greeks,
                open_interest: quote.open_interest,
                volume: quote.volume,
                signed_gex,
            }
        })
        .collect();

    let summary = summarize(&contracts);
    let exposures = gex::exposures_by_strike(&contracts);
    let gamma_flip_strike = gex::gamma_flip(&exposures, s);
    let max_pain_strike = max_pain::max_pain(&contracts, s);
    let pins = gex::detect_pins(&exposures, s);

    let avg_pin_strength = if pins.is_empty() {
        None
    } else {
        Some(pins.iter().map(|p| p.strength).sum::<f64>() / pins.len() as f64)
    };

    let dealers_bias = dealers_bias::compute(&BiasInputs {
        pcr_oi: summary.pcr_oi,
        iv_skew: summary.iv_skew,
        gex_normalized: summary.gex_normalized,
        flip_distance: gamma_flip_strike.map(|strike| strike - s),
        vix: snapshot.vix,
        avg_pin_strength,
    });

    Ok(ChainAnalysis {
        symbol: snapshot.symbol.clone(),
        timestamp: snapshot.timestamp,
        underlying_price: s,
        contracts,
        summary,
        exposures,
        gamma_flip_strike,
        max_pain_strike,
        pins,
        dealers_bias,
    })
}

fn summarize(contracts: &[ContractAnalytics]) -> ChainSummary {
    let mut calls_oi = 0.0;
    let mut puts_oi = 0.0;
    let mut calls_vol = 0.0;
    let mut puts_vol = 0.0;
    let mut call_iv_sum = 0.0;
    let mut call_iv_count = 0usize;
    let mut put_iv_sum = 0.0;
    let mut put_iv_count = 0usize;
    let mut gex_total = 0.0;

    for contract in contracts {
        match contract.kind {
            OptionKind::Call => {
                calls_oi += contract.open_interest;
                calls_vol += contract.volume;
                call_iv_sum += contract.implied_vol;
                call_iv_count += 1;
            }
            OptionKind::Put => {
                puts_oi += contract.open_interest;
                puts_vol += contract.volume;
                put_iv_sum += contract.implied_vol;
                put_iv_count += 1;
            }
        }
        gex_total += contract.signed_gex;
    }

    let avg_call_iv = if call_iv_count > 0 {
        call_iv_sum / call_iv_count as f64
    } else {
        0.0
    };
    let avg_put_iv = if put_iv_count > 0 {
        put_iv_sum / put_iv_count as f64
    } else {
        0.0
    };
    let total_iv_count = call_iv_count + put_iv_count;
    let avg_iv = if total_iv_count > 0 {
        (call_iv_sum + put_iv_sum) / total_iv_count as f64
    } else {
        0.0
    };

    ChainSummary {
        pcr_oi: if calls_oi > 0.0 { puts_oi / calls_oi } else { 0.0 },
        pcr_volume: if calls_vol > 0.0 {
            puts_vol / calls_vol
        } else {
            0.0
        },
        avg_iv,
        iv_skew: avg_put_iv - avg_call_iv,
        gex_total_signed: gex_total,
        gex_normalized: gex_total / GEX_NORMALIZATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 22, 15, 0, 0).unwrap()
    }

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 19, 20, 0, 0).unwrap()
    }

    fn fair_quote(kind: OptionKind, strike: f64, oi: f64, volume: f64) -> OptionQuote {
        let t = types::time_to_expiry_years(expiry(), now());
        let fair = black_scholes::price(kind, 6500.0, strike, t, 0.05, 0.2);
        OptionQuote {
            strike,
            kind,
            bid: fair - 0.5,
            ask: fair + 0.5,
            open_interest: oi,
            volume,
            expiry: expiry(),
        }
    }

    fn snapshot(quotes: Vec<OptionQuote>) -> OptionChainSnapshot {
        OptionChainSnapshot {
            symbol: "ES".to_string(),
            underlying_price: 6500.0,
            risk_free_rate: 0.05,
            vix: Some(18.0),
            timestamp: now(),
            quotes,
        }
    }

    fn balanced_chain() -> OptionChainSnapshot {
        let mut quotes = Vec::new();
        for strike in [6300.0, 6400.0, 6500.0, 6600.0, 6700.0] {
            quotes.push(fair_quote(OptionKind::Call, strike, 1000.0, 300.0));
            quotes.push(fair_quote(OptionKind::Put, strike, 1000.0, 300.0));
        }
        snapshot(quotes)
    }

    // ============================================
    // Error Path Tests
    // ============================================

    #[test]
    fn empty_chain_is_rejected() {
        let result = analyze(&snapshot(Vec::new()), DealerSign::default(), now());
        assert!(matches!(result, Err(AnalyticsError::EmptyChain)));
    }

    #[test]
    fn bad_underlying_price_is_rejected() {
        let mut snap = balanced_chain();
        snap.underlying_price = -1.0;
        let result = analyze(&snap, DealerSign::default(), now());
        assert!(matches!(result, Err(AnalyticsError::BadUnderlyingPrice(_))));
    }

    #[test]
    fn chain_of_only_junk_quotes_is_rejected() {
        let mut quote = fair_quote(OptionKind::Call, 6500.0, 100.0, 10.0);
        quote.bid = 0.0;
        let result = analyze(&snapshot(vec![quote]), DealerSign::default(), now());
        assert!(matches!(result, Err(AnalyticsError::NoUsableQuotes)));
    }

    // ============================================
    // Analysis Tests
    // ============================================

    #[test]
    fn balanced_chain_produces_full_analysis() {
        let analysis = analyze(&balanced_chain(), DealerSign::default(), now()).unwrap();

        assert_eq!(analysis.contracts.len(), 10);
        assert_eq!(analysis.exposures.len(), 5);
        assert!(analysis.gamma_flip_strike.is_some());
        assert!(analysis.max_pain_strike.is_some());
        assert!(!analysis.pins.is_empty());
        assert!((analysis.summary.pcr_oi - 1.0).abs() < f64::EPSILON);
        assert!((analysis.summary.pcr_volume - 1.0).abs() < f64::EPSILON);
        assert!(analysis.summary.avg_iv > 0.0);
        assert!(analysis.dealers_bias.score >= -1.0 && analysis.dealers_bias.score <= 1.0);
    }

    #[test]
    fn recovered_iv_is_close_to_quoted_vol() {
        let analysis = analyze(&balanced_chain(), DealerSign::default(), now()).unwrap();
        // Quotes were generated at sigma 0.2 with a one-point spread, so
        // every solved IV should land in the neighborhood.
        for contract in &analysis.contracts {
            assert!(
                (contract.implied_vol - 0.2).abs() < 0.03,
                "strike {} kind {:?} iv {}",
                contract.strike,
                contract.kind,
                contract.implied_vol
            );
        }
    }

    #[test]
    fn junk_quotes_are_dropped_not_fatal() {
        let mut snap = balanced_chain();
        let mut junk = fair_quote(OptionKind::Call, 6500.0, 100.0, 10.0);
        junk.ask = junk.bid;
        snap.quotes.push(junk);

        let analysis = analyze(&snap, DealerSign::default(), now()).unwrap();
        assert_eq!(analysis.contracts.len(), 10);
    }

    #[test]
    fn dealer_sign_flips_gex_sign() {
        let calls_positive = analyze(&balanced_chain(), DealerSign::default(), now()).unwrap();
        let inverted = analyze(
            &balanced_chain(),
            DealerSign {
                calls: -1.0,
                puts: 1.0,
            },
            now(),
        )
        .unwrap();

        assert!(
            (calls_positive.summary.gex_total_signed + inverted.summary.gex_total_signed).abs()
                < 1e-6
        );
    }

    #[test]
    fn put_heavy_chain_has_high_pcr() {
        let mut quotes = Vec::new();
        for strike in [6400.0, 6500.0, 6600.0] {
            quotes.push(fair_quote(OptionKind::Call, strike, 500.0, 100.0));
            quotes.push(fair_quote(OptionKind::Put, strike, 2000.0, 400.0));
        }
        let analysis = analyze(&snapshot(quotes), DealerSign::default(), now()).unwrap();
        assert!((analysis.summary.pcr_oi - 4.0).abs() < 1e-9);
        assert!((analysis.summary.pcr_volume - 4.0).abs() < 1e-9);
    }

    #[test]
    fn analysis_serializes_to_json() {
        let analysis = analyze(&balanced_chain(), DealerSign::default(), now()).unwrap();
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("dealers_bias"));
        assert!(json.contains("gamma_flip_strike"));
    }
}
