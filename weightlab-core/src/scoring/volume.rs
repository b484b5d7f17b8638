//! Volume-trend signals: trailing average, relative volume and change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metrics::MetricDirection;
use super::normalize::normalize_map;
use crate::domain::{bar, AssetData, Bar};
use crate::indicators::series::{last_finite, pct_change, rolling_mean};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub window: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { window: 50 }
    }
}

/// Latest raw volume signals for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSignals {
    pub average_volume: Option<f64>,
    pub relative_volume: Option<f64>,
    pub volume_change: Option<f64>,
}

pub fn volume_signals(bars: &[Bar], config: &VolumeConfig) -> VolumeSignals {
    let volumes = bar::volumes(bars);
    let average = rolling_mean(&volumes, config.window);
    let relative: Vec<f64> = volumes
        .iter()
        .zip(&average)
        .map(|(v, a)| if *a > 0.0 { v / a } else { f64::NAN })
        .collect();
    VolumeSignals {
        average_volume: last_finite(&average),
        relative_volume: last_finite(&relative),
        volume_change: last_finite(&pct_change(&volumes)),
    }
}

/// Cohort-normalized volume columns, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeScores {
    pub average_volume: BTreeMap<String, f64>,
    pub relative_volume: BTreeMap<String, f64>,
    pub volume_change: BTreeMap<String, f64>,
}

pub fn score_volume(assets: &[AssetData], config: &VolumeConfig) -> VolumeScores {
    let mut raw = VolumeScores::default();
    for asset in assets {
        let signals = volume_signals(&asset.bars, config);
        if let Some(v) = signals.average_volume {
            raw.average_volume.insert(asset.symbol.clone(), v);
        }
        if let Some(v) = signals.relative_volume {
            raw.relative_volume.insert(asset.symbol.clone(), v);
        }
        if let Some(v) = signals.volume_change {
            raw.volume_change.insert(asset.symbol.clone(), v);
        }
    }
    VolumeScores {
        average_volume: normalize_map(&raw.average_volume, MetricDirection::HigherIsBetter),
        relative_volume: normalize_map(&raw.relative_volume, MetricDirection::HigherIsBetter),
        volume_change: normalize_map(&raw.volume_change, MetricDirection::HigherIsBetter),
    }
}
