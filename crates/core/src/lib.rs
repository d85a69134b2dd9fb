pub mod bar;
pub mod config;
pub mod error;
pub mod numeric;
pub mod session;

pub use bar::{Bar, BarSeries};
pub use config::{
    CacheSettings, FeatureWeights, FusionSettings, LeadershipSettings, QualityTier, TierLadder,
    TierStep, ValidatorSettings, WEIGHT_SUM_TOLERANCE,
};
pub use error::{AnalyticsError, ConfigError};
pub use session::{MarketRegime, RegimeMultipliers, SessionMultipliers, SessionPhase};
