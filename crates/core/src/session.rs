//! Session and regime context supplied by the external session manager.
//!
//! The fusion engine consumes these as read-only context; classification
//! itself happens outside this core.

use serde::{Deserialize, Serialize};

/// Trading-session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    PreMarket,
    Regular,
    AfterHours,
    Weekend,
    Holiday,
}

/// Market regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    Unknown,
}

/// Per-session signal-strength multipliers.
///
/// Empirically tuned defaults; tunable, not protocol constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMultipliers {
    pub pre_market: f64,
    pub regular: f64,
    pub after_hours: f64,
    pub weekend: f64,
    pub holiday: f64,
}

impl Default for SessionMultipliers {
    fn default() -> Self {
        Self {
            pre_market: 0.7,
            regular: 1.0,
            after_hours: 0.6,
            weekend: 0.3,
            holiday: 0.4,
        }
    }
}

impl SessionMultipliers {
    /// Multiplier for a session phase.
    #[must_use]
    pub fn for_phase(&self, phase: SessionPhase) -> f64 {
        match phase {
            SessionPhase::PreMarket => self.pre_market,
            SessionPhase::Regular => self.regular,
            SessionPhase::AfterHours => self.after_hours,
            SessionPhase::Weekend => self.weekend,
            SessionPhase::Holiday => self.holiday,
        }
    }
}

/// Per-regime signal-strength multipliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeMultipliers {
    pub trending: f64,
    pub ranging: f64,
    pub volatile: f64,
    pub unknown: f64,
}

impl Default for RegimeMultipliers {
    fn default() -> Self {
        Self {
            trending: 1.1,
            ranging: 0.9,
            volatile: 0.8,
            unknown: 1.0,
        }
    }
}

impl RegimeMultipliers {
    /// Multiplier for a market regime.
    #[must_use]
    pub fn for_regime(&self, regime: MarketRegime) -> f64 {
        match regime {
            MarketRegime::Trending => self.trending,
            MarketRegime::Ranging => self.ranging,
            MarketRegime::Volatile => self.volatile,
            MarketRegime::Unknown => self.unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_multipliers_default_regular_is_one() {
        let m = SessionMultipliers::default();
        assert!((m.for_phase(SessionPhase::Regular) - 1.0).abs() < f64::EPSILON);
        assert!(m.for_phase(SessionPhase::Weekend) < m.for_phase(SessionPhase::Regular));
    }

    #[test]
    fn regime_multipliers_default_unknown_is_one() {
        let m = RegimeMultipliers::default();
        assert!((m.for_regime(MarketRegime::Unknown) - 1.0).abs() < f64::EPSILON);
        assert!(m.for_regime(MarketRegime::Trending) > 1.0);
    }

    #[test]
    fn phases_serialize_round_trip() {
        let json = serde_json::to_string(&SessionPhase::AfterHours).unwrap();
        let back: SessionPhase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionPhase::AfterHours);

        let json = serde_json::to_string(&MarketRegime::Volatile).unwrap();
        let back: MarketRegime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MarketRegime::Volatile);
    }
}
