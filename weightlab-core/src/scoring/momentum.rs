//! Trailing-return momentum over a skip-month window.
//!
//! The window ends one day plus `skip_days` before the as-of date and starts
//! `lookback_days` earlier. Both ends snap to the nearest trading date within
//! `tolerance_days`.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::MetricDirection;
use super::normalize::normalize_map;
use crate::domain::{AssetData, Bar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Calendar days skipped before the as-of date (after the extra day).
    pub skip_days: i64,
    /// Calendar days between the window start and end.
    pub lookback_days: i64,
    /// Maximum distance when snapping a target date to a trading date.
    pub tolerance_days: i64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            skip_days: 21,
            lookback_days: 230,
            tolerance_days: 5,
        }
    }
}

/// Index of the bar dated closest to `target`, within `tolerance_days`.
///
/// Ties resolve to the earlier date. `None` when no bar is close enough.
pub fn find_nearest_date(bars: &[Bar], target: NaiveDate, tolerance_days: i64) -> Option<usize> {
    let lo = target - Duration::days(tolerance_days);
    let hi = target + Duration::days(tolerance_days);
    let start = bars.partition_point(|b| b.date < lo);
    let mut best: Option<(usize, i64)> = None;
    for (i, bar) in bars.iter().enumerate().skip(start) {
        if bar.date > hi {
            break;
        }
        let distance = (bar.date - target).num_days().abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

/// Raw momentum `(close[end] - close[start]) / close[start]` for one asset.
pub fn momentum(bars: &[Bar], as_of: NaiveDate, config: &MomentumConfig) -> Option<f64> {
    let end_target = as_of - Duration::days(1 + config.skip_days);
    let start_target = end_target - Duration::days(config.lookback_days);
    let end = find_nearest_date(bars, end_target, config.tolerance_days)?;
    let start = find_nearest_date(bars, start_target, config.tolerance_days)?;
    if bars[end].date <= bars[start].date {
        return None;
    }
    let base = bars[start].close;
    if base == 0.0 || !base.is_finite() {
        return None;
    }
    let value = (bars[end].close - base) / base;
    value.is_finite().then_some(value)
}

/// Normalized momentum per asset. Assets without momentum get no entry.
pub fn score_momentum(
    assets: &[AssetData],
    as_of: NaiveDate,
    config: &MomentumConfig,
) -> BTreeMap<String, f64> {
    let raw: BTreeMap<String, f64> = assets
        .iter()
        .filter_map(|a| momentum(&a.bars, as_of, config).map(|m| (a.symbol.clone(), m)))
        .collect();
    debug!(
        with_momentum = raw.len(),
        assets = assets.len(),
        "computed momentum"
    );
    normalize_map(&raw, MetricDirection::HigherIsBetter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn bar_on(date: NaiveDate, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One bar per calendar day, close rising by 1.0 per day from 100.
    fn daily_bars(start: NaiveDate, days: i64) -> Vec<Bar> {
        (0..days)
            .map(|i| bar_on(start + Duration::days(i), 100.0 + i as f64))
            .collect()
    }

    #[test]
    fn nearest_date_exact_match() {
        let bars = daily_bars(date(2024, 1, 1), 10);
        assert_eq!(find_nearest_date(&bars, date(2024, 1, 5), 5), Some(4));
    }

    #[test]
    fn nearest_date_tie_resolves_earlier() {
        let bars = vec![bar_on(date(2024, 1, 1), 1.0), bar_on(date(2024, 1, 5), 2.0)];
        assert_eq!(find_nearest_date(&bars, date(2024, 1, 3), 5), Some(0));
    }

    #[test]
    fn nearest_date_outside_tolerance() {
        let bars = vec![bar_on(date(2024, 1, 1), 1.0)];
        assert_eq!(find_nearest_date(&bars, date(2024, 1, 10), 5), None);
        assert_eq!(find_nearest_date(&bars, date(2024, 1, 6), 5), Some(0));
    }

    #[test]
    fn momentum_over_window() {
        let start = date(2023, 1, 1);
        let bars = daily_bars(start, 400);
        let as_of = start + Duration::days(300);
        // end = day 278, start = day 48
        let m = momentum(&bars, as_of, &MomentumConfig::default()).unwrap();
        assert_approx(m, (378.0 - 148.0) / 148.0, DEFAULT_EPSILON);
    }

    #[test]
    fn momentum_missing_when_history_too_short() {
        let start = date(2024, 1, 1);
        let bars = daily_bars(start, 100);
        let as_of = start + Duration::days(120);
        assert!(momentum(&bars, as_of, &MomentumConfig::default()).is_none());
    }

    #[test]
    fn momentum_missing_when_ends_collapse() {
        let bars = vec![bar_on(date(2024, 1, 1), 10.0)];
        let config = MomentumConfig {
            skip_days: 0,
            lookback_days: 2,
            tolerance_days: 5,
        };
        assert!(momentum(&bars, date(2024, 1, 3), &config).is_none());
    }
}
