//! Option chain data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::black_scholes::Greeks;

/// Maximum acceptable relative bid-ask spread for a usable quote.
const MAX_RELATIVE_SPREAD: f64 = 0.6;

/// Contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    Call,
    Put,
}

/// One raw quote from the options data retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    pub kind: OptionKind,
    pub bid: f64,
    pub ask: f64,
    pub open_interest: f64,
    pub volume: f64,
    pub expiry: DateTime<Utc>,
}

impl OptionQuote {
    /// Whether the quote is clean enough to price.
    ///
    /// Rejects empty or crossed markets and spreads wider than 60% of the
    /// ask, which on index options marks a stale or throwaway quote.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        if self.bid <= 0.0 || self.ask <= 0.0 || self.ask <= self.bid {
            return false;
        }
        (self.ask - self.bid) / self.ask <= MAX_RELATIVE_SPREAD
    }

    /// Bid-ask midpoint.
    #[must_use]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// A point-in-time snapshot of one underlying's option chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    pub symbol: String,
    pub underlying_price: f64,
    pub risk_free_rate: f64,
    /// Volatility index level for the underlying (VIX for ES, VXN for NQ)
    pub vix: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub quotes: Vec<OptionQuote>,
}

/// Sign convention applied to per-contract gamma exposure.
///
/// The default assumes dealers are long calls and short puts, so call gamma
/// contributes positively and put gamma negatively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DealerSign {
    pub calls: f64,
    pub puts: f64,
}

impl Default for DealerSign {
    fn default() -> Self {
        Self {
            calls: 1.0,
            puts: -1.0,
        }
    }
}

impl DealerSign {
    #[must_use]
    pub const fn for_kind(&self, kind: OptionKind) -> f64 {
        match kind {
            OptionKind::Call => self.calls,
            OptionKind::Put => self.puts,
        }
    }
}

/// Per-contract analytics derived from one usable quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAnalytics {
    pub strike: f64,
    pub kind: OptionKind,
    pub mid: f64,
    pub implied_vol: f64,
    pub greeks: Greeks,
    pub open_interest: f64,
    pub volume: f64,
    /// `gamma x underlying^2 x open_interest x 100`, dealer-signed
    pub signed_gex: f64,
}

/// Time to expiry in years, floored at one day.
#[must_use]
pub fn time_to_expiry_years(expiry: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (expiry - now).num_seconds() as f64;
    (seconds / (365.0 * 24.0 * 3600.0)).max(1.0 / 365.0)
}
