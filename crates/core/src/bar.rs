//! OHLCV bar types shared by the leadership and confluence engines.
//!
//! A `Bar` is one immutable price/volume sample produced by the market-data
//! adapter. A `BarSeries` is a bounded, chronologically ordered history for
//! one instrument.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::numeric;

/// One OHLCV sample for an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    /// Bar close timestamp
    pub timestamp: DateTime<Utc>,
    /// Opening price
    pub open: Decimal,
    /// Highest price
    pub high: Decimal,
    /// Lowest price
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Total traded volume
    pub volume: Decimal,
    /// Aggressor buy volume, when the feed provides the split
    #[serde(default)]
    pub buy_volume: Option<Decimal>,
    /// Aggressor sell volume, when the feed provides the split
    #[serde(default)]
    pub sell_volume: Option<Decimal>,
}

impl Bar {
    /// Creates a new bar with validation.
    ///
    /// # Errors
    /// Returns error if close is not strictly positive.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Result<Self> {
        if close <= Decimal::ZERO {
            anyhow::bail!("bar close must be positive, got {close}");
        }
        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            buy_volume: None,
            sell_volume: None,
        })
    }

    /// Attaches the buy/sell volume split.
    #[must_use]
    pub fn with_volume_split(mut self, buy: Decimal, sell: Decimal) -> Self {
        self.buy_volume = Some(buy);
        self.sell_volume = Some(sell);
        self
    }

    /// Close price as a sanitized f64.
    #[must_use]
    pub fn close_f64(&self) -> f64 {
        numeric::decimal_to_f64(self.close)
    }

    /// Volume as a sanitized f64.
    #[must_use]
    pub fn volume_f64(&self) -> f64 {
        numeric::decimal_to_f64(self.volume)
    }

    /// High-low range.
    #[must_use]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Bounded, chronologically ordered bar history for one instrument.
///
/// Insertion order is chronological order: `push` rejects bars whose
/// timestamp moves backwards. When the bound is reached the oldest bar is
/// evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries {
    /// Bar timeframe in minutes
    timeframe_minutes: u32,
    /// Maximum retained bars
    max_bars: usize,
    bars: VecDeque<Bar>,
}

impl BarSeries {
    /// Creates an empty series.
    #[must_use]
    pub fn new(timeframe_minutes: u32, max_bars: usize) -> Self {
        Self {
            timeframe_minutes: timeframe_minutes.max(1),
            max_bars: max_bars.max(1),
            bars: VecDeque::new(),
        }
    }

    /// Appends a bar, evicting the oldest when over capacity.
    ///
    /// # Errors
    /// Returns error if the bar's timestamp precedes the last bar's.
    pub fn push(&mut self, bar: Bar) -> Result<()> {
        if let Some(last) = self.bars.back() {
            if bar.timestamp < last.timestamp {
                tracing::debug!(
                    incoming = %bar.timestamp,
                    tail = %last.timestamp,
                    "rejecting out-of-order bar"
                );
                anyhow::bail!(
                    "bar timestamp {} precedes series tail {}",
                    bar.timestamp,
                    last.timestamp
                );
            }
        }
        if self.bars.len() == self.max_bars {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        Ok(())
    }

    /// Bar timeframe in minutes.
    #[must_use]
    pub fn timeframe_minutes(&self) -> u32 {
        self.timeframe_minutes
    }

    /// Number of retained bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Returns true when no bars are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All retained bars in chronological order.
    #[must_use]
    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    /// The most recent `n` bars in chronological order.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<&Bar> {
        let skip = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(skip).collect()
    }

    /// Sanitized close prices for the whole series.
    #[must_use]
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(Bar::close_f64).collect()
    }

    /// Timestamp and sanitized close pairs, used for cross-series alignment.
    #[must_use]
    pub fn timestamped_closes(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.bars
            .iter()
            .map(|b| (b.timestamp, b.close_f64()))
            .collect()
    }

    /// Bar-over-bar returns for the most recent `n` bars.
    ///
    /// Non-finite ratios (zero previous close) are dropped.
    #[must_use]
    pub fn returns(&self, n: usize) -> Vec<f64> {
        let tail = self.tail(n);
        tail.windows(2)
            .filter_map(|pair| {
                let prev = pair[0].close_f64();
                let cur = pair[1].close_f64();
                if prev.abs() < f64::EPSILON {
                    return None;
                }
                let r = (cur - prev) / prev;
                r.is_finite().then_some(r)
            })
            .collect()
    }

    /// Total volume over the most recent `n` bars.
    #[must_use]
    pub fn volume_sum(&self, n: usize) -> f64 {
        self.tail(n).iter().map(|b| b.volume_f64()).sum()
    }

    /// Mean per-bar volume over the most recent `n` bars (or the whole
    /// series when shorter). Returns a small floor instead of zero so
    /// relative-volume ratios stay finite.
    #[must_use]
    pub fn rolling_avg_volume(&self, n: usize) -> f64 {
        let span = n.min(self.bars.len());
        if span == 0 {
            return 1e-6;
        }
        let avg = self.volume_sum(span) / span as f64;
        if avg.is_finite() && avg > 1e-6 {
            avg
        } else {
            1e-6
        }
    }

    /// Buy/sell imbalance over the most recent `n` bars:
    /// `(buy − sell) / (buy + sell)`, 0.0 when the split is unavailable.
    #[must_use]
    pub fn volume_imbalance(&self, n: usize) -> f64 {
        let mut buy = 0.0;
        let mut sell = 0.0;
        let mut seen = false;
        for bar in self.tail(n) {
            if let (Some(b), Some(s)) = (bar.buy_volume, bar.sell_volume) {
                buy += numeric::decimal_to_f64(b);
                sell += numeric::decimal_to_f64(s);
                seen = true;
            }
        }
        if !seen {
            return 0.0;
        }
        let denom = (buy + sell).max(1e-6);
        numeric::sanitize((buy - sell) / denom)
    }
}
