//! Annualized Sharpe-like ratio from daily close-to-close returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metrics::MetricDirection;
use super::normalize::normalize_map;
use crate::domain::{bar, AssetData};
use crate::indicators::series::{mean, pct_change, sample_std};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpeConfig {
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
}

impl Default for SharpeConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.01,
            periods_per_year: 252,
        }
    }
}

impl SharpeConfig {
    pub fn daily_risk_free(&self) -> f64 {
        (1.0 + self.risk_free_rate).powf(1.0 / self.periods_per_year as f64) - 1.0
    }
}

/// `mean(excess) / std(excess) * sqrt(periods)` over the close series.
///
/// `None` with fewer than two returns or zero dispersion.
pub fn sharpe_ratio(closes: &[f64], config: &SharpeConfig) -> Option<f64> {
    let rf = config.daily_risk_free();
    let excess: Vec<f64> = pct_change(closes)
        .into_iter()
        .filter(|r| r.is_finite())
        .map(|r| r - rf)
        .collect();
    let std = sample_std(&excess)?;
    if std == 0.0 {
        return None;
    }
    let ratio = mean(&excess)? / std * (config.periods_per_year as f64).sqrt();
    ratio.is_finite().then_some(ratio)
}

pub fn score_sharpe(assets: &[AssetData], config: &SharpeConfig) -> BTreeMap<String, f64> {
    let raw: BTreeMap<String, f64> = assets
        .iter()
        .filter_map(|a| {
            sharpe_ratio(&bar::closes(&a.bars), config).map(|s| (a.symbol.clone(), s))
        })
        .collect();
    normalize_map(&raw, MetricDirection::HigherIsBetter)
}
