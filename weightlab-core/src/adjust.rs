//! Weight adjuster: technical, pattern, Markov and level signals applied as a
//! multiplicative factor on the aggregator's weights.
//!
//! Each signal contributes an independent additive adjustment; their sum
//! `total` scales the weight by `max(0, 1 + total)`. Missing inputs
//! contribute zero. The weights are renormalized afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::rsi::{OVERBOUGHT, OVERSOLD};
use crate::indicators::series;
use crate::patterns::PatternBias;
use crate::signal_bank::SignalRow;
use crate::weights::WeightVector;

pub const RSI_STEP: f64 = 0.05;
pub const MACD_STEP: f64 = 0.05;
pub const BAND_BREAK_STEP: f64 = 0.05;
pub const BAND_WIDTH_STEP: f64 = 0.03;
/// Bandwidth `(upper - lower) / middle` above which the bands count as wide.
pub const WIDE_BANDS: f64 = 0.10;
pub const NARROW_BANDS: f64 = 0.05;
pub const AVERAGE_STEP: f64 = 0.05;
pub const VOLATILITY_STEP: f64 = 0.05;
pub const MARKOV_STEP: f64 = 0.10;
pub const LEVEL_SCALE: f64 = 0.1;
pub const PATTERN_STEP: f64 = 0.03;

/// Per-signal adjustments for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentBreakdown {
    pub rsi: f64,
    pub macd: f64,
    pub bollinger_break: f64,
    pub bollinger_width: f64,
    pub sma: f64,
    pub ema: f64,
    pub volatility: f64,
    pub markov: f64,
    pub support: f64,
    pub resistance: f64,
    pub patterns: f64,
}

impl AdjustmentBreakdown {
    pub fn total(&self) -> f64 {
        self.rsi
            + self.macd
            + self.bollinger_break
            + self.bollinger_width
            + self.sma
            + self.ema
            + self.volatility
            + self.markov
            + self.support
            + self.resistance
            + self.patterns
    }

    /// Multiplier applied to the weight.
    pub fn factor(&self) -> f64 {
        (1.0 + self.total()).max(0.0)
    }
}

/// Output of the adjustment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedWeights {
    pub breakdowns: BTreeMap<String, AdjustmentBreakdown>,
    pub weights: WeightVector,
}

fn above_or_below(value: f64, reference: f64, step: f64) -> f64 {
    if value > reference {
        step
    } else {
        -step
    }
}

/// Adjustments for one row. `mean_volatility` is the cohort mean.
pub fn breakdown(row: &SignalRow, mean_volatility: Option<f64>) -> AdjustmentBreakdown {
    let mut b = AdjustmentBreakdown::default();

    if let Some(rsi) = row.rsi {
        if rsi > OVERBOUGHT {
            b.rsi = -RSI_STEP;
        } else if rsi < OVERSOLD {
            b.rsi = RSI_STEP;
        }
    }

    if let (Some(macd), Some(signal)) = (row.macd, row.macd_signal) {
        b.macd = above_or_below(macd, signal, MACD_STEP);
    }

    if let (Some(price), Some(upper), Some(lower)) =
        (row.price, row.bollinger_upper, row.bollinger_lower)
    {
        if price > upper {
            b.bollinger_break = BAND_BREAK_STEP;
        } else if price < lower {
            b.bollinger_break = -BAND_BREAK_STEP;
        }
    }
    if let (Some(upper), Some(middle), Some(lower)) =
        (row.bollinger_upper, row.bollinger_middle, row.bollinger_lower)
    {
        if middle != 0.0 {
            let width = (upper - lower) / middle;
            if width > WIDE_BANDS {
                b.bollinger_width = BAND_WIDTH_STEP;
            } else if width < NARROW_BANDS {
                b.bollinger_width = -BAND_WIDTH_STEP;
            }
        }
    }

    if let Some(price) = row.price {
        if let Some(sma) = row.sma {
            b.sma = above_or_below(price, sma, AVERAGE_STEP);
        }
        if let Some(ema) = row.ema {
            b.ema = above_or_below(price, ema, AVERAGE_STEP);
        }
        if let Some(support) = row.support {
            if price >= support && price > 0.0 {
                let distance = (price - support) / price;
                b.support = LEVEL_SCALE * (1.0 - distance).clamp(0.0, 1.0);
            }
        }
        if let Some(resistance) = row.resistance {
            if price <= resistance && price > 0.0 {
                let distance = (resistance - price) / price;
                b.resistance = -LEVEL_SCALE * (1.0 - distance).clamp(0.0, 1.0);
            }
        }
    }

    if let (Some(vol), Some(mean)) = (row.volatility, mean_volatility) {
        b.volatility = if vol > mean {
            -VOLATILITY_STEP
        } else {
            VOLATILITY_STEP
        };
    }

    if let Some(state) = row.markov_state {
        b.markov = if state.is_bearish() {
            -MARKOV_STEP
        } else {
            MARKOV_STEP
        };
    }

    b.patterns = row
        .patterns
        .iter()
        .map(|p| match p.bias() {
            PatternBias::Bullish => PATTERN_STEP,
            PatternBias::Bearish => -PATTERN_STEP,
            PatternBias::Neutral => 0.0,
        })
        .sum();

    b
}

/// Mean of the defined volatilities across rows.
pub fn mean_volatility(rows: &BTreeMap<String, SignalRow>) -> Option<f64> {
    let vols: Vec<f64> = rows.values().filter_map(|r| r.volatility).collect();
    series::mean(&vols)
}

/// Apply every row's adjustment factor to `base` and renormalize.
///
/// Symbols without a row keep factor 1.
pub fn adjust_weights(base: &WeightVector, rows: &BTreeMap<String, SignalRow>) -> AdjustedWeights {
    let mean_vol = mean_volatility(rows);
    let mut breakdowns = BTreeMap::new();
    let scaled: WeightVector = base
        .iter()
        .map(|(symbol, weight)| {
            let b = rows
                .get(symbol)
                .map(|row| breakdown(row, mean_vol))
                .unwrap_or_default();
            let factor = b.factor();
            breakdowns.insert(symbol.to_string(), b);
            (symbol.to_string(), weight * factor)
        })
        .collect();
    debug!(
        assets = breakdowns.len(),
        mean_volatility = ?mean_vol,
        "applied weight adjustments"
    );
    AdjustedWeights {
        breakdowns,
        weights: scaled.renormalized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use crate::markov::MarkovState;
    use crate::patterns::CandlestickPattern;

    fn row() -> SignalRow {
        SignalRow::empty(50)
    }

    #[test]
    fn overbought_rsi_alone() {
        let r = SignalRow {
            rsi: Some(75.0),
            ..row()
        };
        let b = breakdown(&r, None);
        assert_approx(b.total(), -0.05, DEFAULT_EPSILON);
        assert_approx(b.factor(), 0.95, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_row_is_neutral() {
        assert_eq!(breakdown(&row(), Some(1.0)).factor(), 1.0);
    }

    #[test]
    fn bands_and_averages() {
        let r = SignalRow {
            price: Some(112.0),
            sma: Some(100.0),
            ema: Some(115.0),
            bollinger_upper: Some(110.0),
            bollinger_middle: Some(100.0),
            bollinger_lower: Some(90.0),
            ..row()
        };
        let b = breakdown(&r, None);
        assert_approx(b.bollinger_break, 0.05, DEFAULT_EPSILON);
        // width 0.2 > 0.10
        assert_approx(b.bollinger_width, 0.03, DEFAULT_EPSILON);
        assert_approx(b.sma, 0.05, DEFAULT_EPSILON);
        assert_approx(b.ema, -0.05, DEFAULT_EPSILON);
    }

    #[test]
    fn narrow_bands_penalized() {
        let r = SignalRow {
            bollinger_upper: Some(101.0),
            bollinger_middle: Some(100.0),
            bollinger_lower: Some(99.0),
            ..row()
        };
        assert_approx(breakdown(&r, None).bollinger_width, -0.03, DEFAULT_EPSILON);
    }

    #[test]
    fn levels_scale_with_distance() {
        let r = SignalRow {
            price: Some(100.0),
            support: Some(90.0),
            resistance: Some(105.0),
            ..row()
        };
        let b = breakdown(&r, None);
        assert_approx(b.support, 0.1 * 0.9, DEFAULT_EPSILON);
        assert_approx(b.resistance, -0.1 * 0.95, DEFAULT_EPSILON);

        let far = SignalRow {
            price: Some(100.0),
            resistance: Some(250.0),
            ..row()
        };
        assert_eq!(breakdown(&far, None).resistance, 0.0);
    }

    #[test]
    fn markov_volatility_and_patterns() {
        let r = SignalRow {
            volatility: Some(3.0),
            markov_state: Some(MarkovState::MildDown),
            patterns: vec![
                CandlestickPattern::Hammer,
                CandlestickPattern::Doji,
                CandlestickPattern::Harami,
                CandlestickPattern::SpinningTop,
            ],
            ..row()
        };
        let b = breakdown(&r, Some(2.0));
        assert_approx(b.volatility, -0.05, DEFAULT_EPSILON);
        assert_approx(b.markov, -0.10, DEFAULT_EPSILON);
        assert_approx(b.patterns, 0.03, DEFAULT_EPSILON);
    }

    #[test]
    fn factor_never_negative() {
        let b = AdjustmentBreakdown {
            markov: -2.0,
            ..AdjustmentBreakdown::default()
        };
        assert_eq!(b.factor(), 0.0);
    }

    #[test]
    fn adjusted_weights_renormalize() {
        let base: WeightVector = [("A".to_string(), 0.5), ("B".to_string(), 0.5)]
            .into_iter()
            .collect();
        let mut rows = BTreeMap::new();
        rows.insert(
            "A".to_string(),
            SignalRow {
                rsi: Some(75.0),
                ..row()
            },
        );
        let out = adjust_weights(&base, &rows);
        assert_approx(out.weights.sum(), 1.0, DEFAULT_EPSILON);
        assert_approx(out.weights.get("A").unwrap(), 0.95 / 1.95, DEFAULT_EPSILON);
        assert_eq!(out.breakdowns["B"], AdjustmentBreakdown::default());
    }
}
