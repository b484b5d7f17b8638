//! Min-max normalization of metric series to [0, 1].
//!
//! Normalization is always cohort-wide: an asset's normalized value depends on
//! the min and max of the whole column, so the entry points take complete
//! series (or a whole `MetricTable` column), never a single value.

use std::collections::BTreeMap;

use super::metrics::{MetricDirection, MetricTable};

/// Rescale finite values to [0, 1] using the series' own min and max.
///
/// - `HigherIsBetter`: `(x - min) / (max - min)`
/// - `LowerIsBetter`: `1 - (x - min) / (max - min)`
///
/// Non-finite inputs map to NaN. When max == min (or no finite value exists)
/// every entry is NaN: the metric does not discriminate this run.
pub fn normalize(values: &[f64], direction: MetricDirection) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;
    if !span.is_finite() || span == 0.0 {
        return vec![f64::NAN; values.len()];
    }
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return f64::NAN;
            }
            let scaled = (v - min) / span;
            match direction {
                MetricDirection::HigherIsBetter => scaled,
                MetricDirection::LowerIsBetter => 1.0 - scaled,
            }
        })
        .collect()
}

/// Normalize a symbol-keyed series. Keys are preserved.
pub fn normalize_map(
    series: &BTreeMap<String, f64>,
    direction: MetricDirection,
) -> BTreeMap<String, f64> {
    let values: Vec<f64> = series.values().copied().collect();
    series
        .keys()
        .cloned()
        .zip(normalize(&values, direction))
        .collect()
}

/// Copy of `table` with `metric` normalized across all symbols that carry it.
///
/// Symbols without the metric stay without it. Returns the table unchanged
/// when no symbol carries the metric.
pub fn normalize_column(
    table: &MetricTable,
    metric: &str,
    direction: MetricDirection,
) -> MetricTable {
    let present: BTreeMap<String, f64> = table
        .column(metric)
        .into_iter()
        .filter_map(|(s, v)| v.map(|v| (s, v)))
        .collect();
    if present.is_empty() {
        return table.clone();
    }
    table.with_column(metric, &normalize_map(&present, direction))
}
