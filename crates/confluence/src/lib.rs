//! Confluence fusion: merges leadership, options and order-flow features
//! into one bounded, tiered trade-quality score.

pub mod cache;
pub mod engine;
pub mod source;

pub use cache::{CacheStats, Fingerprint, SignalCache};
pub use engine::{ConfluenceEngine, ConfluenceResult, FusionRequest};
pub use source::{FeatureHub, FeatureSource};
