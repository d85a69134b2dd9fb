//! Error taxonomy for the fusion core.
//!
//! Only configuration errors are hard failures. Numerical instability and
//! insufficient data are absorbed into degraded results by the engines and
//! never surface through these types.

use thiserror::Error;

/// Fatal configuration errors, raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("feature weights must sum to 1.0 (±{tolerance}), got {sum}")]
    WeightSum { sum: f64, tolerance: f64 },

    #[error("feature weight for '{name}' must be non-negative and finite, got {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("unknown feature name in weight map: '{0}'")]
    UnknownFeature(String),

    #[error("threshold '{name}' out of range: {value}")]
    InvalidThreshold { name: String, value: f64 },

    #[error("tier ladder must be strictly descending, '{0}' breaks the order")]
    TierOrder(String),

    #[error("cache capacity must be non-zero")]
    ZeroCacheCapacity,
}

/// Errors from the options analytics engine.
///
/// These cover structurally unusable input; per-quote numerical issues are
/// handled by falling back to clipped defaults instead.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("option chain snapshot has no contracts")]
    EmptyChain,

    #[error("no contracts survived the quote filter")]
    NoUsableQuotes,

    #[error("underlying price must be positive, got {0}")]
    BadUnderlyingPrice(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_name_the_problem() {
        let err = ConfigError::WeightSum {
            sum: 0.9,
            tolerance: 0.001,
        };
        assert!(err.to_string().contains("0.9"));

        let err = ConfigError::UnknownFeature("typo_feature".to_string());
        assert!(err.to_string().contains("typo_feature"));
    }

    #[test]
    fn analytics_error_messages_are_descriptive() {
        let err = AnalyticsError::BadUnderlyingPrice(-1.0);
        assert!(err.to_string().contains("-1"));
        assert!(AnalyticsError::EmptyChain.to_string().contains("no contracts"));
    }
}
