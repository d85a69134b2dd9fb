//! Feature sources: the producers feeding the fusion engine.
//!
//! Each source computes one pre-normalized score in [0, 1]. Sources run
//! concurrently; a failing or non-finite source is replaced by the neutral
//! default with a logged warning so one bad producer never poisons the
//! whole fusion.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::BTreeMap;

use signal_fusion_core::numeric::clip;

/// One named feature producer.
#[async_trait]
pub trait FeatureSource: Send {
    fn name(&self) -> &str;

    /// Computes the feature score in [0, 1].
    async fn compute(&mut self) -> Result<f64>;
}

/// Runs a set of feature sources concurrently and collects their scores.
pub struct FeatureHub {
    sources: Vec<Box<dyn FeatureSource>>,
    neutral: f64,
}

impl FeatureHub {
    #[must_use]
    pub fn new(neutral: f64) -> Self {
        Self {
            sources: Vec::new(),
            neutral,
        }
    }

    pub fn register(&mut self, source: Box<dyn FeatureSource>) {
        self.sources.push(source);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Computes all features concurrently.
    ///
    /// Failures and non-finite values are isolated to the neutral default;
    /// the remaining sources are unaffected.
    pub async fn collect(&mut self) -> BTreeMap<String, f64> {
        let neutral = self.neutral;
        let futures = self.sources.iter_mut().map(|source| async move {
            let name = source.name().to_string();
            let score = match source.compute().await {
                Ok(value) if value.is_finite() => clip(value, 0.0, 1.0),
                Ok(value) => {
                    tracing::warn!(feature = %name, value, "non-finite feature score, using neutral");
                    neutral
                }
                Err(error) => {
                    tracing::warn!(feature = %name, %error, "feature source failed, using neutral");
                    neutral
                }
            };
            (name, score)
        });

        join_all(futures).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct FixedSource {
        name: &'static str,
        value: f64,
    }

    #[async_trait]
    impl FeatureSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn compute(&mut self) -> Result<f64> {
            Ok(self.value)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl FeatureSource for FailingSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn compute(&mut self) -> Result<f64> {
            bail!("upstream feed unavailable")
        }
    }

    #[tokio::test]
    async fn collects_all_registered_sources() {
        let mut hub = FeatureHub::new(0.5);
        hub.register(Box::new(FixedSource {
            name: "leadership",
            value: 0.8,
        }));
        hub.register(Box::new(FixedSource {
            name: "dealers_bias",
            value: 0.3,
        }));

        let features = hub.collect().await;
        assert_eq!(features.len(), 2);
        assert!((features["leadership"] - 0.8).abs() < f64::EPSILON);
        assert!((features["dealers_bias"] - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failing_source_defaults_to_neutral_without_poisoning_others() {
        let mut hub = FeatureHub::new(0.5);
        hub.register(Box::new(FixedSource {
            name: "leadership",
            value: 0.9,
        }));
        hub.register(Box::new(FailingSource));

        let features = hub.collect().await;
        assert!((features["broken"] - 0.5).abs() < f64::EPSILON);
        assert!((features["leadership"] - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn non_finite_score_defaults_to_neutral() {
        let mut hub = FeatureHub::new(0.5);
        hub.register(Box::new(FixedSource {
            name: "orderflow",
            value: f64::NAN,
        }));

        let features = hub.collect().await;
        assert!((features["orderflow"] - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clipped() {
        let mut hub = FeatureHub::new(0.5);
        hub.register(Box::new(FixedSource {
            name: "hot",
            value: 1.7,
        }));

        let features = hub.collect().await;
        assert!((features["hot"] - 1.0).abs() < f64::EPSILON);
    }
}
