//! Typed configuration for the fusion engines.
//!
//! All configuration is externally loaded and arrives here as plain
//! structured values. Construction is fail-fast: an invalid weight map or
//! threshold is a fatal `ConfigError`, never a silently degraded run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::session::{RegimeMultipliers, SessionMultipliers};

/// Tolerance for the feature-weight sum check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Validated name→weight map for confluence fusion.
///
/// Weights must be non-negative, finite, and sum to 1.0 within
/// [`WEIGHT_SUM_TOLERANCE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct FeatureWeights {
    weights: BTreeMap<String, f64>,
}

impl FeatureWeights {
    /// Validates and wraps a weight map.
    ///
    /// # Errors
    /// Returns `ConfigError` when a weight is negative/non-finite or the
    /// sum strays from 1.0.
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        for (name, &weight) in &weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: name.clone(),
                    weight,
                });
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum {
                sum,
                tolerance: WEIGHT_SUM_TOLERANCE,
            });
        }
        Ok(Self { weights })
    }

    /// Checks every weighted name against the set of known feature names.
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownFeature` for the first unrecognized name.
    pub fn check_known(&self, known: &[&str]) -> Result<(), ConfigError> {
        for name in self.weights.keys() {
            if !known.contains(&name.as_str()) {
                return Err(ConfigError::UnknownFeature(name.clone()));
            }
        }
        Ok(())
    }

    /// Weight for a feature name, if configured.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    /// Iterates over (name, weight) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Number of weighted features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns true when no features are weighted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for FeatureWeights {
    type Error = ConfigError;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<FeatureWeights> for BTreeMap<String, f64> {
    fn from(value: FeatureWeights) -> Self {
        value.weights
    }
}

/// Leadership engine thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadershipSettings {
    /// Scoring windows expressed in minutes
    pub window_minutes: Vec<u32>,
    /// Bars a new candidate must persist before a switch commits
    pub persistence_bars: u32,
    /// Minimum vote fraction for a confident candidate
    pub min_strength: f64,
    /// Bound on the leadership-change history
    pub max_history: usize,
}

impl Default for LeadershipSettings {
    fn default() -> Self {
        Self {
            window_minutes: vec![1, 5, 15],
            persistence_bars: 3,
            min_strength: 0.35,
            max_history: 1000,
        }
    }
}

impl LeadershipSettings {
    /// Validates thresholds.
    ///
    /// # Errors
    /// Returns `ConfigError` for an empty window list or an out-of-range
    /// strength threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_minutes.is_empty() {
            return Err(ConfigError::InvalidThreshold {
                name: "window_minutes".to_string(),
                value: 0.0,
            });
        }
        if !(0.0..=1.0).contains(&self.min_strength) {
            return Err(ConfigError::InvalidThreshold {
                name: "min_strength".to_string(),
                value: self.min_strength,
            });
        }
        Ok(())
    }
}

/// Leadership validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Minimum correlation intensity for any risk at all
    pub corr_min: f64,
    /// Minimum leader strength (|correlation|)
    pub leader_strength_min: f64,
    /// Correlation-quality floor
    pub min_correlation_quality: f64,
    /// Leadership-consistency floor
    pub min_leadership_consistency: f64,
    /// Ceiling on the resulting risk multiplier
    pub max_risk_threshold: f64,
    /// Aligned points used for the correlation
    pub lookback: usize,
    /// Halves thresholds and downgrades hard rejects to soft downgrades
    pub calibration_mode: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            corr_min: 0.75,
            leader_strength_min: 0.35,
            min_correlation_quality: 0.5,
            min_leadership_consistency: 0.3,
            max_risk_threshold: 1.0,
            lookback: 30,
            calibration_mode: false,
        }
    }
}

impl ValidatorSettings {
    /// Validates thresholds.
    ///
    /// # Errors
    /// Returns `ConfigError` when any unit-interval threshold is out of
    /// range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_fields = [
            ("corr_min", self.corr_min),
            ("leader_strength_min", self.leader_strength_min),
            ("min_correlation_quality", self.min_correlation_quality),
            ("min_leadership_consistency", self.min_leadership_consistency),
            ("max_risk_threshold", self.max_risk_threshold),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Quality tier of a fused signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    Premium,
    Strong,
    Good,
    Weak,
    NoTrade,
}

/// One rung of the quality ladder: scores at or above `min_score` earn the
/// tier and its position-size multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStep {
    pub min_score: f64,
    pub tier: QualityTier,
    pub size_multiplier: f64,
}

/// Descending threshold ladder mapping fused scores to quality tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierLadder {
    steps: Vec<TierStep>,
}

impl Default for TierLadder {
    fn default() -> Self {
        Self {
            steps: vec![
                TierStep {
                    min_score: 0.75,
                    tier: QualityTier::Premium,
                    size_multiplier: 1.5,
                },
                TierStep {
                    min_score: 0.55,
                    tier: QualityTier::Strong,
                    size_multiplier: 1.0,
                },
                TierStep {
                    min_score: 0.40,
                    tier: QualityTier::Good,
                    size_multiplier: 0.5,
                },
                TierStep {
                    min_score: 0.25,
                    tier: QualityTier::Weak,
                    size_multiplier: 0.25,
                },
            ],
        }
    }
}

impl TierLadder {
    /// Builds a ladder from steps, validating descending order.
    ///
    /// # Errors
    /// Returns `ConfigError::TierOrder` when thresholds are not strictly
    /// descending.
    pub fn new(steps: Vec<TierStep>) -> Result<Self, ConfigError> {
        for pair in steps.windows(2) {
            if pair[1].min_score >= pair[0].min_score {
                return Err(ConfigError::TierOrder(format!("{:?}", pair[1].tier)));
            }
        }
        Ok(Self { steps })
    }

    /// Classifies a score, falling through to `NoTrade` with zero size.
    #[must_use]
    pub fn classify(&self, score: f64) -> (QualityTier, f64) {
        for step in &self.steps {
            if score >= step.min_score {
                return (step.tier, step.size_multiplier);
            }
        }
        (QualityTier::NoTrade, 0.0)
    }
}

/// Cache bounds for fused results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_seconds: 60,
        }
    }
}

impl CacheSettings {
    /// Validates the capacity bound.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroCacheCapacity` when capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        Ok(())
    }
}

/// Full configuration for the confluence fusion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSettings {
    /// Validated feature weight map
    pub weights: FeatureWeights,
    /// Neutral baseline a missing feature defaults to, and the pivot for
    /// session/regime adjustment
    pub neutral_score: f64,
    /// Lower bound of the final score
    pub min_score: f64,
    /// Upper bound of the final score
    pub max_score: f64,
    /// Fraction of the score range reserved for the saturating soft-cap
    pub soft_cap_band: f64,
    pub session_multipliers: SessionMultipliers,
    pub regime_multipliers: RegimeMultipliers,
    pub tiers: TierLadder,
    pub cache: CacheSettings,
}

impl FusionSettings {
    /// Builds settings around a validated weight map, with defaults for
    /// everything else.
    #[must_use]
    pub fn new(weights: FeatureWeights) -> Self {
        Self {
            weights,
            neutral_score: 0.5,
            min_score: 0.0,
            max_score: 1.0,
            soft_cap_band: 0.1,
            session_multipliers: SessionMultipliers::default(),
            regime_multipliers: RegimeMultipliers::default(),
            tiers: TierLadder::default(),
            cache: CacheSettings::default(),
        }
    }

    /// Validates the composite configuration.
    ///
    /// # Errors
    /// Returns the first `ConfigError` found in any section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_score <= self.min_score {
            return Err(ConfigError::InvalidThreshold {
                name: "max_score".to_string(),
                value: self.max_score,
            });
        }
        if !(0.0..=0.5).contains(&self.soft_cap_band) {
            return Err(ConfigError::InvalidThreshold {
                name: "soft_cap_band".to_string(),
                value: self.soft_cap_band,
            });
        }
        self.cache.validate()
    }
}
