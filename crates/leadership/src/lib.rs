pub mod engine;
pub mod validator;

pub use engine::{
    Instrument, LeadershipChange, LeadershipEngine, LeadershipResult, LeadershipStatus,
    WindowBreakdown, WindowScores,
};
pub use validator::{validate, TradeBias, ValidationDecision, ValidationResult};
