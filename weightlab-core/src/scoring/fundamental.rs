//! Fundamental aggregator: normalized metric table → per-asset weights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::{MetricDirection, MetricTable, METRIC_DIRECTIONS};
use super::normalize::{normalize_column, normalize_map};
use crate::indicators::series;
use crate::weights::WeightVector;

/// Output of the aggregation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalWeights {
    /// Input table with every direction-mapped column normalized.
    pub normalized: MetricTable,
    /// Mean of the present, defined normalized metrics. NaN when none are.
    pub scores: BTreeMap<String, f64>,
    pub weights: WeightVector,
}

/// Normalize every direction-mapped column present in `table`.
pub fn normalize_table(table: &MetricTable) -> MetricTable {
    METRIC_DIRECTIONS
        .iter()
        .filter(|(metric, _)| table.has_metric(metric))
        .fold(table.clone(), |acc, (metric, direction)| {
            normalize_column(&acc, metric, *direction)
        })
}

/// Mean of the direction-mapped, finite values in each row.
pub fn fundamental_scores(normalized: &MetricTable) -> BTreeMap<String, f64> {
    normalized
        .symbols()
        .map(|symbol| {
            let values: Vec<f64> = METRIC_DIRECTIONS
                .iter()
                .filter_map(|(metric, _)| normalized.get(symbol, metric))
                .collect();
            (
                symbol.to_string(),
                series::mean(&values).unwrap_or(f64::NAN),
            )
        })
        .collect()
}

/// Combine all normalized metrics into one weight per asset.
///
/// `weight = normalize(score) / n`, renormalized to sum to one. An asset with
/// an undefined normalized score weighs zero; if no asset has positive
/// weight the vector is uniform.
pub fn aggregate(table: &MetricTable) -> FundamentalWeights {
    let normalized = normalize_table(table);
    let scores = fundamental_scores(&normalized);
    let n = scores.len().max(1) as f64;
    let weights: WeightVector = normalize_map(&scores, MetricDirection::HigherIsBetter)
        .into_iter()
        .map(|(symbol, s)| (symbol, s / n))
        .collect();
    let weights = weights.renormalized();
    debug!(
        assets = scores.len(),
        metrics = normalized.metrics().len(),
        "aggregated fundamental scores"
    );
    FundamentalWeights {
        normalized,
        scores,
        weights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn table(rows: Vec<(&str, Vec<(&str, f64)>)>) -> MetricTable {
        let mut t = MetricTable::new();
        for (symbol, cells) in rows {
            t.add_symbol(symbol);
            for (metric, v) in cells {
                t.set(symbol, metric, v);
            }
        }
        t
    }

    #[test]
    fn scores_average_normalized_metrics() {
        let t = table(vec![
            ("A", vec![("market_cap", 100.0), ("beta", 2.0)]),
            ("B", vec![("market_cap", 300.0), ("beta", 1.0)]),
            ("C", vec![("market_cap", 200.0), ("beta", 1.5)]),
        ]);
        let out = aggregate(&t);
        assert_approx(out.scores["A"], 0.0, DEFAULT_EPSILON);
        assert_approx(out.scores["B"], 1.0, DEFAULT_EPSILON);
        assert_approx(out.scores["C"], 0.5, DEFAULT_EPSILON);
        assert_approx(out.weights.get("B").unwrap(), 2.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(out.weights.get("C").unwrap(), 1.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(out.weights.get("A").unwrap(), 0.0, DEFAULT_EPSILON);
        assert_approx(out.weights.sum(), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn unmapped_metrics_do_not_score() {
        let t = table(vec![
            ("A", vec![("market_cap", 1.0), ("relative_volume", 9.0)]),
            ("B", vec![("market_cap", 2.0), ("relative_volume", 1.0)]),
        ]);
        let out = aggregate(&t);
        // relative_volume stays raw and does not pull A up
        assert_eq!(out.normalized.get("A", "relative_volume"), Some(9.0));
        assert_approx(out.scores["A"], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn degenerate_metrics_are_excluded_from_mean() {
        let t = table(vec![
            ("A", vec![("market_cap", 1.0), ("beta", 1.0)]),
            ("B", vec![("market_cap", 3.0), ("beta", 1.0)]),
        ]);
        let out = aggregate(&t);
        assert!(out.normalized.get("A", "beta").unwrap().is_nan());
        assert_approx(out.scores["B"], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn degenerate_cohort_falls_back_to_uniform() {
        let t = table(vec![("A", vec![("market_cap", 5.0)]), ("B", vec![("market_cap", 5.0)])]);
        let out = aggregate(&t);
        assert!(out.scores["A"].is_nan());
        assert_approx(out.weights.get("A").unwrap(), 0.5, DEFAULT_EPSILON);
        assert_approx(out.weights.get("B").unwrap(), 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn input_table_is_not_mutated() {
        let t = table(vec![("A", vec![("market_cap", 1.0)]), ("B", vec![("market_cap", 2.0)])]);
        let before = t.clone();
        let _ = aggregate(&t);
        assert_eq!(t, before);
    }
}
