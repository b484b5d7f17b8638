//! Bar: the fundamental market data unit.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Absolute size of the candle body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Signed body: positive for a white (up) candle, negative for a black one.
    pub fn signed_body(&self) -> f64 {
        self.close - self.open
    }

    /// High-to-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}

/// Extract the close series from a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Extract the volume series (as f64) from a bar slice.
pub fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume as f64).collect()
}

/// Bars dated on or after `cutoff`. Bars are assumed ascending by date.
pub fn since(bars: &[Bar], cutoff: NaiveDate) -> &[Bar] {
    let start = bars.partition_point(|b| b.date < cutoff);
    &bars[start..]
}

/// Bars dated within `years` before `as_of`, both ends inclusive.
pub fn trailing_years(bars: &[Bar], as_of: NaiveDate, years: u32) -> &[Bar] {
    let cutoff = as_of
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN);
    let upto = bars.partition_point(|b| b.date <= as_of);
    since(&bars[..upto], cutoff)
}
