//! Portfolio-balance signal from position concentration and discount-to-cost.
//!
//! Two sub-scores per held asset, each normalized higher-is-better:
//! - discount: `(avg_cost - price) / avg_cost`, positive when the asset trades
//!   below its acquisition cost
//! - balance: `total_cost_basis / market_value`, large for under-weighted holdings
//!
//! The blend `discount_weight * discount + balance_weight * balance` is the
//! `portfolio_diversity` metric.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::MetricDirection;
use super::normalize::normalize_map;
use crate::domain::AssetData;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityWeights {
    pub discount: f64,
    pub balance: f64,
}

impl Default for DiversityWeights {
    fn default() -> Self {
        Self {
            discount: 0.7,
            balance: 0.3,
        }
    }
}

/// Intermediate scores for one holding, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityBreakdown {
    pub discount: f64,
    pub balance: f64,
    pub diversity: f64,
}

/// Diversity signal per held asset.
///
/// Assets without a position record, without a price, or with a zero cost
/// basis get no entry. A holding with zero market value is treated as
/// maximally under-weighted: it takes the largest finite balance score of the
/// cohort before normalization.
pub fn score_diversity(
    assets: &[AssetData],
    weights: DiversityWeights,
) -> BTreeMap<String, DiversityBreakdown> {
    struct Holding<'a> {
        symbol: &'a str,
        price: f64,
        units: f64,
        average_cost: f64,
    }

    let holdings: Vec<Holding> = assets
        .iter()
        .filter_map(|a| {
            let position = a.position.as_ref()?;
            Some(Holding {
                symbol: &a.symbol,
                price: a.current_price()?,
                units: position.units,
                average_cost: position.average_cost,
            })
        })
        .filter(|h| h.average_cost != 0.0 && h.average_cost.is_finite())
        .collect();

    if holdings.is_empty() {
        return BTreeMap::new();
    }

    let total_cost: f64 = holdings.iter().map(|h| h.units * h.average_cost).sum();

    let discount: BTreeMap<String, f64> = holdings
        .iter()
        .map(|h| {
            (
                h.symbol.to_string(),
                (h.average_cost - h.price) / h.average_cost,
            )
        })
        .collect();

    let mut balance: BTreeMap<String, f64> = holdings
        .iter()
        .map(|h| {
            let market_value = h.units * h.price;
            let score = if total_cost <= 0.0 {
                f64::NAN
            } else if market_value <= 0.0 {
                f64::INFINITY
            } else {
                total_cost / market_value
            };
            (h.symbol.to_string(), score)
        })
        .collect();

    let max_finite = balance
        .values()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NAN, f64::max);
    for v in balance.values_mut() {
        if v.is_infinite() {
            *v = if max_finite.is_nan() { 1.0 } else { max_finite };
        }
    }

    let discount_n = normalize_map(&discount, MetricDirection::HigherIsBetter);
    let balance_n = normalize_map(&balance, MetricDirection::HigherIsBetter);

    let mut out = BTreeMap::new();
    for (symbol, &d) in &discount_n {
        let b = balance_n.get(symbol).copied().unwrap_or(f64::NAN);
        let diversity = match (d.is_nan(), b.is_nan()) {
            (true, true) => f64::NAN,
            (false, true) => weights.discount * d,
            (true, false) => weights.balance * b,
            (false, false) => weights.discount * d + weights.balance * b,
        };
        out.insert(
            symbol.clone(),
            DiversityBreakdown {
                discount: d,
                balance: b,
                diversity,
            },
        );
    }
    debug!(holdings = out.len(), total_cost, "scored portfolio diversity");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketSnapshot, PositionRecord};
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn held(symbol: &str, price: f64, units: f64, avg_cost: f64) -> AssetData {
        AssetData::new(
            symbol,
            Vec::new(),
            MarketSnapshot::from_fields([("current_price", price)]),
        )
        .with_position(PositionRecord {
            symbol: symbol.to_string(),
            units,
            average_cost: avg_cost,
            as_of: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        })
    }

    #[test]
    fn cheaper_and_smaller_position_scores_highest() {
        // A: bought at 100, now 80, small. B: bought at 100, now 120, large.
        let assets = vec![held("A", 80.0, 1.0, 100.0), held("B", 120.0, 10.0, 100.0)];
        let scores = score_diversity(&assets, DiversityWeights::default());
        assert_approx(scores["A"].diversity, 1.0, DEFAULT_EPSILON);
        assert_approx(scores["B"].diversity, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn blend_uses_configured_weights() {
        // A: big discount but large position; B: no discount, small position.
        let assets = vec![held("A", 50.0, 10.0, 100.0), held("B", 100.0, 1.0, 100.0)];
        let scores = score_diversity(&assets, DiversityWeights::default());
        assert_approx(scores["A"].diversity, 0.7, DEFAULT_EPSILON);
        assert_approx(scores["B"].diversity, 0.3, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_units_counts_as_maximal_balance() {
        let assets = vec![
            held("A", 100.0, 0.0, 100.0),
            held("B", 100.0, 1.0, 100.0),
            held("C", 100.0, 3.0, 100.0),
        ];
        let scores = score_diversity(&assets, DiversityWeights::default());
        assert_approx(scores["A"].balance, 1.0, DEFAULT_EPSILON);
        assert_approx(scores["B"].balance, 1.0, DEFAULT_EPSILON);
        assert_approx(scores["C"].balance, 0.0, DEFAULT_EPSILON);
        // discount is degenerate (all at cost) so only balance contributes
        assert!(scores["A"].discount.is_nan());
        assert_approx(scores["C"].diversity, 0.0, DEFAULT_EPSILON);
        assert_approx(scores["B"].diversity, 0.3, DEFAULT_EPSILON);
    }

    #[test]
    fn unheld_assets_have_no_entry() {
        let unheld = AssetData::new(
            "X",
            Vec::new(),
            MarketSnapshot::from_fields([("current_price", 10.0)]),
        );
        let assets = vec![held("A", 10.0, 1.0, 12.0), unheld];
        let scores = score_diversity(&assets, DiversityWeights::default());
        assert!(scores.contains_key("A"));
        assert!(!scores.contains_key("X"));
    }
}
