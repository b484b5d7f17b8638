//! Metric names, their normalization polarity, and the per-asset metric table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalization polarity of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricDirection {
    HigherIsBetter,
    LowerIsBetter,
}

// Derived metric names written by the scorers.
pub const MOMENTUM: &str = "momentum";
pub const PORTFOLIO_DIVERSITY: &str = "portfolio_diversity";
pub const AVERAGE_VOLUME: &str = "average_volume";
pub const RELATIVE_VOLUME: &str = "relative_volume";
pub const VOLUME_CHANGE: &str = "volume_change";
pub const SHARPE_RATIO: &str = "sharpe_ratio";

use MetricDirection::{HigherIsBetter as High, LowerIsBetter as Low};

/// Every metric that feeds the fundamental score, with its polarity.
pub const METRIC_DIRECTIONS: &[(&str, MetricDirection)] = &[
    ("market_cap", High),
    ("trailing_pe", Low),
    ("forward_pe", Low),
    ("price_to_sales", Low),
    ("book_value", High),
    ("peg_ratio", Low),
    ("dividend_yield", High),
    ("debt_to_equity", Low),
    ("return_on_equity", High),
    (MOMENTUM, High),
    (PORTFOLIO_DIVERSITY, High),
    ("beta", Low),
    ("current_ratio", High),
    ("quick_ratio", High),
    ("free_cashflow", High),
    ("operating_margins", High),
    ("ebitda_margins", High),
    ("gross_margins", High),
    ("payout_ratio", Low),
    ("price_to_book", Low),
    ("enterprise_to_revenue", Low),
    ("enterprise_to_ebitda", Low),
    ("earnings_quarterly_growth", High),
    ("revenue_growth", High),
    ("return_on_assets", High),
    ("operating_cashflow", High),
    (AVERAGE_VOLUME, High),
    (VOLUME_CHANGE, High),
    (SHARPE_RATIO, High),
];

/// Polarity of a metric, or `None` if it does not feed the fundamental score.
pub fn direction_of(metric: &str) -> Option<MetricDirection> {
    METRIC_DIRECTIONS
        .iter()
        .find(|(name, _)| *name == metric)
        .map(|(_, d)| *d)
}

/// One row of named metrics. NaN marks a value that is undefined for this run
/// (e.g. a degenerate normalization); absent keys mark missing inputs.
pub type MetricRow = BTreeMap<String, f64>;

/// Symbol → metric row.
///
/// Rows and columns are kept in sorted order so every iteration over the
/// table is deterministic. Stages return new tables instead of mutating
/// the one they were given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTable {
    rows: BTreeMap<String, MetricRow>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with one empty row per symbol.
    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: symbols
                .into_iter()
                .map(|s| (s.into(), MetricRow::new()))
                .collect(),
        }
    }

    /// Ensure a row exists for `symbol`.
    pub fn add_symbol(&mut self, symbol: impl Into<String>) {
        self.rows.entry(symbol.into()).or_default();
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, symbol: &str) -> Option<&MetricRow> {
        self.rows.get(symbol)
    }

    /// Raw cell value (may be NaN).
    pub fn get(&self, symbol: &str, metric: &str) -> Option<f64> {
        self.rows.get(symbol).and_then(|r| r.get(metric)).copied()
    }

    /// Set a cell. Unknown symbols get a new row.
    pub fn set(&mut self, symbol: &str, metric: &str, value: f64) {
        self.rows
            .entry(symbol.to_string())
            .or_default()
            .insert(metric.to_string(), value);
    }

    /// True if any row carries the metric.
    pub fn has_metric(&self, metric: &str) -> bool {
        self.rows.values().any(|r| r.contains_key(metric))
    }

    /// Sorted, de-duplicated list of every metric present in any row.
    pub fn metrics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rows
            .values()
            .flat_map(|r| r.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// A column as (symbol, value) pairs in symbol order; `None` where absent.
    pub fn column(&self, metric: &str) -> Vec<(String, Option<f64>)> {
        self.rows
            .iter()
            .map(|(s, r)| (s.clone(), r.get(metric).copied()))
            .collect()
    }

    /// Copy of the table with `metric` replaced by `values`.
    ///
    /// Symbols missing from `values` lose the metric.
    pub fn with_column(&self, metric: &str, values: &BTreeMap<String, f64>) -> Self {
        let mut next = self.clone();
        for (symbol, row) in next.rows.iter_mut() {
            match values.get(symbol) {
                Some(v) => {
                    row.insert(metric.to_string(), *v);
                }
                None => {
                    row.remove(metric);
                }
            }
        }
        next
    }
}
