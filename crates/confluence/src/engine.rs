//! Weighted confluence fusion.
//!
//! Combines pre-normalized feature scores into one confluence score:
//! weighted sum, session and regime adjustment applied to the delta from
//! neutral, a saturating soft-cap at the score bounds, and a quality-tier
//! classification carrying the position-size multiplier. Results are cached
//! by market fingerprint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use signal_fusion_core::numeric::clip;
use signal_fusion_core::{ConfigError, FusionSettings, MarketRegime, QualityTier, SessionPhase};

use crate::cache::{CacheStats, Fingerprint, SignalCache};

/// One fusion request: the feature scores plus the market context.
#[derive(Debug, Clone)]
pub struct FusionRequest {
    pub features: BTreeMap<String, f64>,
    pub session: SessionPhase,
    pub regime: MarketRegime,
    pub fingerprint: Fingerprint,
}

/// Output of one fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceResult {
    /// Weighted contribution of each configured feature
    pub contributions: BTreeMap<String, f64>,
    /// Plain weighted sum of feature scores
    pub raw_score: f64,
    /// After session/regime adjustment, before the soft-cap
    pub adjusted_score: f64,
    /// Bounded final score
    pub final_score: f64,
    pub session_multiplier: f64,
    pub regime_multiplier: f64,
    pub soft_cap_applied: bool,
    pub tier: QualityTier,
    pub size_multiplier: f64,
    /// Features that were missing or non-finite and fell back to neutral
    pub defaulted_features: Vec<String>,
    /// True when this result was served from the fingerprint cache
    #[serde(default)]
    pub from_cache: bool,
}

/// The fusion engine. Cheap to share behind `&self`; the cache carries the
/// only interior lock.
pub struct ConfluenceEngine {
    settings: FusionSettings,
    cache: SignalCache<Fingerprint, ConfluenceResult>,
    computations: AtomicU64,
}

impl ConfluenceEngine {
    /// Builds an engine, failing fast on invalid configuration.
    pub fn new(settings: FusionSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let cache = SignalCache::new(&settings.cache);
        Ok(Self {
            settings,
            cache,
            computations: AtomicU64::new(0),
        })
    }

    /// Fuses one request, serving repeats of the same fingerprint from
    /// cache within the TTL.
    pub fn fuse(&self, request: &FusionRequest) -> ConfluenceResult {
        if let Some(mut hit) = self.cache.get(&request.fingerprint) {
            hit.from_cache = true;
            return hit;
        }
        let result = self.compute(request);
        self.cache.put(request.fingerprint.clone(), result.clone());
        result
    }

    fn compute(&self, request: &FusionRequest) -> ConfluenceResult {
        self.computations.fetch_add(1, Ordering::Relaxed);

        let neutral = self.settings.neutral_score;
        let mut raw = 0.0;
        let mut defaulted = Vec::new();
        let mut contributions = BTreeMap::new();

        for (name, weight) in self.settings.weights.iter() {
            let value = match request.features.get(name) {
                Some(&v) if v.is_finite() => clip(v, 0.0, 1.0),
                Some(&v) => {
                    tracing::warn!(feature = %name, value = v, "non-finite feature, using neutral");
                    defaulted.push(name.to_string());
                    neutral
                }
                None => {
                    tracing::warn!(feature = %name, "missing feature, using neutral");
                    defaulted.push(name.to_string());
                    neutral
                }
            };
            contributions.insert(name.to_string(), weight * value);
            raw += weight * value;
        }

        let session_multiplier = self.settings.session_multipliers.for_phase(request.session);
        let regime_multiplier = self.settings.regime_multipliers.for_regime(request.regime);

        // Multipliers scale the distance from neutral, not the whole score,
        // so a quiet session shrinks conviction without shifting the
        // baseline.
        let delta = raw - neutral;
        let adjusted = neutral + delta * session_multiplier * regime_multiplier;

        let (final_score, soft_cap_applied) = self.soft_cap(adjusted);
        let (tier, size_multiplier) = self.settings.tiers.classify(final_score);

        tracing::debug!(
            raw,
            adjusted,
            final_score,
            ?tier,
            session = ?request.session,
            regime = ?request.regime,
            "confluence fused"
        );

        ConfluenceResult {
            contributions,
            raw_score: raw,
            adjusted_score: adjusted,
            final_score,
            session_multiplier,
            regime_multiplier,
            soft_cap_applied,
            tier,
            size_multiplier,
            defaulted_features: defaulted,
            from_cache: false,
        }
    }

    /// Saturating compression near the score bounds.
    ///
    /// Beyond the knee the score is squashed through tanh, so ordering is
    /// preserved and the output approaches but never reaches the bound. The
    /// flag reports only scores that actually exceeded a bound; knee-band
    /// compression of an in-bounds score is not a capping event.
    fn soft_cap(&self, score: f64) -> (f64, bool) {
        let lo = self.settings.min_score;
        let hi = self.settings.max_score;
        let band = self.settings.soft_cap_band;
        let out_of_bounds = score < lo || score > hi;

        if band <= 0.0 {
            return (clip(score, lo, hi), out_of_bounds);
        }

        let hi_knee = hi - band;
        if score > hi_knee {
            return (hi_knee + band * ((score - hi_knee) / band).tanh(), out_of_bounds);
        }

        let lo_knee = lo + band;
        if score < lo_knee {
            return (lo_knee - band * ((lo_knee - score) / band).tanh(), out_of_bounds);
        }

        (score, false)
    }

    /// How many fusions were actually computed (cache misses).
    #[must_use]
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    #[must_use]
    pub fn settings(&self) -> &FusionSettings {
        &self.settings
    }
}
