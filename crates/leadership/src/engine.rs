//! ES/NQ leadership detection with hysteresis.
//!
//! Scores both instruments over several time windows (momentum, order flow,
//! efficiency), takes a majority vote, and runs the result through a
//! debounced state machine: a new leader must persist through a confirmation
//! period, and a freshly committed switch starts a cooldown during which
//! opposing votes are ignored. This is anti-flap logic: at most one
//! leadership change per cooldown interval, however noisy the ticks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use signal_fusion_core::numeric::{clip, safe_std};
use signal_fusion_core::{BarSeries, LeadershipSettings};

/// Momentum component weight in the window score.
const MOMENTUM_WEIGHT: f64 = 0.40;
/// Order-flow component weight.
const FLOW_WEIGHT: f64 = 0.35;
/// Efficiency component weight.
const EFFICIENCY_WEIGHT: f64 = 0.25;
/// Bars of cooldown after a committed leadership switch.
const COOLDOWN_BARS: i64 = 2;

/// One of the two correlated instruments under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Es,
    Nq,
}

impl Instrument {
    /// The other instrument of the pair.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Es => Self::Nq,
            Self::Nq => Self::Es,
        }
    }
}

/// Component scores for one instrument over one window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WindowScores {
    /// Sum of returns over return volatility, clipped to [-10, 10]
    pub momentum: f64,
    /// Relative volume scaled by order-flow imbalance, clipped to [0, 10]
    pub flow: f64,
    /// |sum of returns| over return volatility, clipped to [0, 10]
    pub efficiency: f64,
    /// Weighted total
    pub total: f64,
}

/// Per-window vote and score breakdown for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowBreakdown {
    /// Window length in minutes
    pub minutes: u32,
    /// Window length converted to bars
    pub bars: usize,
    pub es: WindowScores,
    pub nq: WindowScores,
    /// Which instrument this window voted for
    pub vote: Instrument,
}

/// Output of one leadership evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadershipResult {
    /// Confirmed leader, if any
    pub leader: Option<Instrument>,
    /// Fraction of window votes agreeing with the majority, in [0, 1]
    pub strength: f64,
    /// True when the confirmed leader matched this tick's candidate
    pub persisted: bool,
    /// Per-window votes
    pub votes: Vec<Instrument>,
    /// Per-window score breakdown
    pub windows: Vec<WindowBreakdown>,
}

impl LeadershipResult {
    fn inconclusive(strength: f64, votes: Vec<Instrument>, windows: Vec<WindowBreakdown>) -> Self {
        Self {
            leader: None,
            strength,
            persisted: false,
            votes,
            windows,
        }
    }
}

/// One committed leadership change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadershipChange {
    pub timestamp: DateTime<Utc>,
    pub leader: Instrument,
    pub strength: f64,
    pub votes: Vec<Instrument>,
}

/// Status snapshot of the engine's internal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadershipStatus {
    pub current_leader: Option<Instrument>,
    pub confirm_until: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub history_count: usize,
    pub calculation_count: u64,
    pub last_calculation: Option<DateTime<Utc>>,
}

/// Leadership-detection engine.
///
/// Owns its mutable state exclusively: single-writer discipline, mutated
/// only by [`LeadershipEngine::evaluate`]. Concurrent callers must serialize
/// externally.
#[derive(Debug)]
pub struct LeadershipEngine {
    timeframe_minutes: u32,
    /// Window lengths converted from minutes to bar counts, floor 2 bars
    windows: Vec<(u32, usize)>,
    max_history: usize,
    current_leader: Option<Instrument>,
    confirm_until: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
    history: VecDeque<LeadershipChange>,
    calculation_count: u64,
    last_calculation: Option<DateTime<Utc>>,
}

impl LeadershipEngine {
    /// Creates an engine for a given bar timeframe.
    #[must_use]
    pub fn new(settings: &LeadershipSettings, timeframe_minutes: u32) -> Self {
        let tf = timeframe_minutes.max(1);
        let windows = settings
            .window_minutes
            .iter()
            .map(|&minutes| {
                let bars = ((minutes.max(1) / tf) as usize).max(2);
                (minutes, bars)
            })
            .collect();
        Self {
            timeframe_minutes: tf,
            windows,
            max_history: settings.max_history,
            current_leader: None,
            confirm_until: None,
            cooldown_until: None,
            history: VecDeque::new(),
            calculation_count: 0,
            last_calculation: None,
        }
    }

    /// Component scores for one series over one window.
    ///
    /// Returns zero scores when the series is shorter than the window.
    #[must_use]
    pub fn compute_window_scores(series: &BarSeries, window_bars: usize) -> WindowScores {
        if series.len() < window_bars {
            return WindowScores::default();
        }

        let returns = series.returns(window_bars);
        let (ret_sum, vol) = if returns.is_empty() {
            (0.0, 1e-6)
        } else {
            (returns.iter().sum::<f64>(), safe_std(&returns))
        };
        let momentum = clip(ret_sum / vol, -10.0, 10.0);

        let current_vol = series.volume_sum(window_bars);
        let vol_ma = series.rolling_avg_volume(window_bars * 5);
        let vol_rel = clip(current_vol / vol_ma, 0.0, 5.0);
        let imbalance = clip(series.volume_imbalance(window_bars), -0.99, 0.99);
        let flow = clip(vol_rel * (1.0 + imbalance), 0.0, 10.0);

        let efficiency = clip(ret_sum.abs() / vol, 0.0, 10.0);

        let total =
            MOMENTUM_WEIGHT * momentum + FLOW_WEIGHT * flow + EFFICIENCY_WEIGHT * efficiency;

        WindowScores {
            momentum,
            flow,
            efficiency,
            total,
        }
    }

    /// Evaluates leadership for this tick, mutating internal state.
    ///
    /// `persistence_bars` controls how long a new candidate must hold before
    /// a switch commits; `min_strength` is the vote fraction below which no
    /// confident candidate exists.
    pub fn evaluate(
        &mut self,
        es: &BarSeries,
        nq: &BarSeries,
        now: DateTime<Utc>,
        persistence_bars: u32,
        min_strength: f64,
    ) -> LeadershipResult {
        let mut votes = Vec::with_capacity(self.windows.len());
        let mut windows = Vec::with_capacity(self.windows.len());

        for &(minutes, bars) in &self.windows {
            let es_scores = Self::compute_window_scores(es, bars);
            let nq_scores = Self::compute_window_scores(nq, bars);
            let vote = if es_scores.total > nq_scores.total {
                Instrument::Es
            } else {
                Instrument::Nq
            };
            votes.push(vote);
            windows.push(WindowBreakdown {
                minutes,
                bars,
                es: es_scores,
                nq: nq_scores,
                vote,
            });
        }

        self.calculation_count += 1;
        self.last_calculation = Some(now);

        if votes.is_empty() {
            return LeadershipResult::inconclusive(0.0, votes, windows);
        }

        let es_votes = votes.iter().filter(|&&v| v == Instrument::Es).count();
        let nq_votes = votes.len() - es_votes;
        let (candidate, agreeing) = if es_votes >= nq_votes {
            (Instrument::Es, es_votes)
        } else {
            (Instrument::Nq, nq_votes)
        };
        let strength = agreeing as f64 / votes.len() as f64;

        if strength < min_strength {
            return LeadershipResult::inconclusive(strength, votes, windows);
        }

        let persisted = self.advance_state(candidate, strength, &votes, now, persistence_bars);

        LeadershipResult {
            leader: self.current_leader,
            strength,
            persisted,
            votes,
            windows,
        }
    }

    /// Runs the hysteresis state machine for a confident candidate.
    /// Returns the `persisted` flag for this tick.
    fn advance_state(
        &mut self,
        candidate: Instrument,
        strength: f64,
        votes: &[Instrument],
        now: DateTime<Utc>,
        persistence_bars: u32,
    ) -> bool {
        if Some(candidate) == self.current_leader {
            // Leader unchanged: drop any pending confirmation, let an
            // expired cooldown lapse.
            self.confirm_until = None;
            if matches!(self.cooldown_until, Some(until) if now >= until) {
                self.cooldown_until = None;
                tracing::debug!("leadership cooldown expired");
            }
            return true;
        }

        if matches!(self.cooldown_until, Some(until) if now < until) {
            tracing::debug!(
                ?candidate,
                current = ?self.current_leader,
                "leadership flip ignored during cooldown"
            );
            return false;
        }

        match self.confirm_until {
            None => {
                let deadline = now
                    + Duration::minutes(i64::from(persistence_bars * self.timeframe_minutes));
                self.confirm_until = Some(deadline);
                tracing::debug!(
                    ?candidate,
                    current = ?self.current_leader,
                    %deadline,
                    "leadership switch detected, awaiting confirmation"
                );
                false
            }
            Some(deadline) if now >= deadline => {
                let old = self.current_leader;
                self.current_leader = Some(candidate);
                self.confirm_until = None;
                self.cooldown_until =
                    Some(now + Duration::minutes(COOLDOWN_BARS * i64::from(self.timeframe_minutes)));
                if self.history.len() == self.max_history {
                    self.history.pop_front();
                }
                self.history.push_back(LeadershipChange {
                    timestamp: now,
                    leader: candidate,
                    strength,
                    votes: votes.to_vec(),
                });
                tracing::debug!(?old, new = ?candidate, "leadership switch confirmed");
                true
            }
            Some(_) => false,
        }
    }

    /// Confirmed leader, if any.
    #[must_use]
    pub fn current_leader(&self) -> Option<Instrument> {
        self.current_leader
    }

    /// Directional leader score for downstream feature producers:
    /// +1.0 when ES leads, -1.0 when NQ leads, 0.0 with no leader.
    #[must_use]
    pub fn leader_score(&self) -> f64 {
        match self.current_leader {
            Some(Instrument::Es) => 1.0,
            Some(Instrument::Nq) => -1.0,
            None => 0.0,
        }
    }

    /// Status snapshot for observability.
    #[must_use]
    pub fn status(&self) -> LeadershipStatus {
        LeadershipStatus {
            current_leader: self.current_leader,
            confirm_until: self.confirm_until,
            cooldown_until: self.cooldown_until,
            history_count: self.history.len(),
            calculation_count: self.calculation_count,
            last_calculation: self.last_calculation,
        }
    }

    /// The most recent `count` committed leadership changes.
    #[must_use]
    pub fn recent_history(&self, count: usize) -> Vec<&LeadershipChange> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).collect()
    }

    /// Clears all state back to construction defaults.
    pub fn reset(&mut self) {
        self.current_leader = None;
        self.confirm_until = None;
        self.cooldown_until = None;
        self.history.clear();
        self.calculation_count = 0;
        self.last_calculation = None;
    }
}
