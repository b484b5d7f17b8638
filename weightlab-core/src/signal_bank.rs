//! Technical and pattern signal bank.
//!
//! Builds one `SignalRow` per asset from its trailing bar history: moving
//! averages, oscillators, bands, volatility, volume flow, candlestick
//! patterns, support/resistance and a sampled Markov prediction. The weight
//! adjuster reads only these rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{bar, AssetData, Bar};
use crate::indicators::series::{last_finite, rolling_std, sample_std};
use crate::indicators::{
    recent_trend, Bollinger, Ema, Indicator, Macd, OnBalanceVolume, RollingVolatility, Rsi, Sma,
    Trend,
};
use crate::markov::{MarkovConfig, MarkovError, MarkovModel, MarkovState};
use crate::patterns::{active_patterns, CandlestickPattern, Levels};
use crate::rng::RngHierarchy;

/// Scope name for the Markov sampling streams.
pub const MARKOV_RNG_SCOPE: &str = "markov";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalConfig {
    /// Years of history the signal bank looks at.
    pub lookback_years: u32,
    /// Window of the recent-volatility probe that picks the dynamic window.
    pub volatility_probe: usize,
    /// Dynamic window when recent volatility exceeds the full-window level.
    pub fast_window: usize,
    pub slow_window: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    /// Neighbours on each side for support/resistance extrema.
    pub level_order: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            lookback_years: 3,
            volatility_probe: 30,
            fast_window: 25,
            slow_window: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            level_order: 10,
        }
    }
}

/// Technical parameters the indicators cannot work with.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TechnicalConfigError {
    #[error("{name} must be >= {min}, got {value}")]
    WindowTooShort {
        name: &'static str,
        value: usize,
        min: usize,
    },

    #[error("MACD requires 1 <= fast < slow and signal >= 1, got {fast}/{slow}/{signal}")]
    InvalidMacd {
        fast: usize,
        slow: usize,
        signal: usize,
    },

    #[error("bollinger_multiplier must be positive, got {0}")]
    InvalidBollingerMultiplier(f64),
}

fn at_least(name: &'static str, value: usize, min: usize) -> Result<(), TechnicalConfigError> {
    if value < min {
        return Err(TechnicalConfigError::WindowTooShort { name, value, min });
    }
    Ok(())
}

impl TechnicalConfig {
    pub fn validate(&self) -> Result<(), TechnicalConfigError> {
        at_least("fast_window", self.fast_window, 2)?;
        at_least("slow_window", self.slow_window, 2)?;
        at_least("volatility_probe", self.volatility_probe, 2)?;
        at_least("rsi_period", self.rsi_period, 1)?;
        if self.macd_fast == 0 || self.macd_slow <= self.macd_fast || self.macd_signal == 0 {
            return Err(TechnicalConfigError::InvalidMacd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            });
        }
        at_least("bollinger_period", self.bollinger_period, 2)?;
        if !(self.bollinger_multiplier.is_finite() && self.bollinger_multiplier > 0.0) {
            return Err(TechnicalConfigError::InvalidBollingerMultiplier(
                self.bollinger_multiplier,
            ));
        }
        Ok(())
    }
}

/// Latest technical view of one asset. Every numeric field is optional:
/// short histories leave indicators in warmup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub price: Option<f64>,
    pub window: usize,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub volatility: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    /// Position of the price inside the bands, 0 at lower and 1 at upper.
    pub percent_b: Option<f64>,
    pub obv: Option<f64>,
    pub obv_prev: Option<f64>,
    pub trend: Trend,
    pub patterns: Vec<CandlestickPattern>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub markov_state: Option<MarkovState>,
}

impl SignalRow {
    /// Row with no signals at all.
    pub fn empty(window: usize) -> Self {
        Self {
            price: None,
            window,
            sma: None,
            ema: None,
            volatility: None,
            rsi: None,
            macd: None,
            macd_signal: None,
            bollinger_upper: None,
            bollinger_middle: None,
            bollinger_lower: None,
            percent_b: None,
            obv: None,
            obv_prev: None,
            trend: Trend::Flat,
            patterns: Vec::new(),
            support: None,
            resistance: None,
            markov_state: None,
        }
    }
}

/// Rows for every asset plus the assets whose Markov step failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalBank {
    pub rows: BTreeMap<String, SignalRow>,
    #[serde(skip)]
    pub markov_failures: BTreeMap<String, MarkovError>,
}

/// Window used by SMA, EMA and volatility.
///
/// The fast window applies when the latest rolling std over `volatility_probe`
/// closes exceeds the std of the whole series.
pub fn dynamic_window(closes: &[f64], config: &TechnicalConfig) -> usize {
    let recent = last_finite(&rolling_std(closes, config.volatility_probe));
    match (recent, sample_std(closes)) {
        (Some(recent), Some(overall)) if recent > overall => config.fast_window,
        _ => config.slow_window,
    }
}

/// Indicator and pattern fields of a row, without the Markov prediction.
pub fn technical_row(bars: &[Bar], price: Option<f64>, config: &TechnicalConfig) -> SignalRow {
    let closes = bar::closes(bars);
    let window = dynamic_window(&closes, config);

    let obv = OnBalanceVolume::new().compute(bars);
    let n = obv.len();
    let bollinger_upper = Bollinger::upper(config.bollinger_period, config.bollinger_multiplier)
        .latest(bars);
    let bollinger_middle = Bollinger::middle(config.bollinger_period, config.bollinger_multiplier)
        .latest(bars);
    let bollinger_lower = Bollinger::lower(config.bollinger_period, config.bollinger_multiplier)
        .latest(bars);
    let percent_b = match (price, bollinger_upper, bollinger_lower) {
        (Some(p), Some(u), Some(l)) if u > l => Some((p - l) / (u - l)),
        _ => None,
    };
    let levels = Levels::from_closes(&closes, config.level_order);

    SignalRow {
        price,
        window,
        sma: Sma::new(window).latest(bars),
        ema: Ema::new(window).latest(bars),
        volatility: RollingVolatility::new(window).latest(bars),
        rsi: Rsi::new(config.rsi_period).latest(bars),
        macd: Macd::line(config.macd_fast, config.macd_slow, config.macd_signal).latest(bars),
        macd_signal: Macd::signal(config.macd_fast, config.macd_slow, config.macd_signal)
            .latest(bars),
        bollinger_upper,
        bollinger_middle,
        bollinger_lower,
        percent_b,
        obv: obv.last().copied(),
        obv_prev: n.checked_sub(2).map(|i| obv[i]),
        trend: recent_trend(bars),
        patterns: active_patterns(bars),
        support: levels.support,
        resistance: levels.resistance,
        markov_state: None,
    }
}

/// Build the signal bank for all assets as of `as_of`.
///
/// Each asset samples its Markov prediction from its own stream derived from
/// `rngs`, so rows do not depend on which other assets are present.
pub fn build_signals(
    assets: &[AssetData],
    as_of: NaiveDate,
    technical: &TechnicalConfig,
    markov: &MarkovConfig,
    rngs: &RngHierarchy,
) -> SignalBank {
    let mut bank = SignalBank::default();
    for asset in assets {
        let bars = bar::trailing_years(&asset.bars, as_of, technical.lookback_years);
        let mut row = technical_row(bars, asset.current_price(), technical);

        let mut rng = rngs.rng_for(MARKOV_RNG_SCOPE, &asset.symbol);
        match MarkovModel::fit_bars(&asset.bars, as_of, markov)
            .and_then(|model| model.predict(&mut rng))
        {
            Ok(state) => row.markov_state = Some(state),
            Err(e) => {
                warn!(symbol = %asset.symbol, error = %e, "no markov prediction");
                bank.markov_failures.insert(asset.symbol.clone(), e);
            }
        }

        debug!(
            symbol = %asset.symbol,
            window = row.window,
            patterns = row.patterns.len(),
            markov = ?row.markov_state,
            "built signal row"
        );
        bank.rows.insert(asset.symbol.clone(), row);
    }
    bank
}
