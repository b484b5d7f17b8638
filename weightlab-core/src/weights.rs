//! WeightVector: symbol → non-negative budget share.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Non-negative weight per symbol, summing to one after `renormalized`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector {
    weights: BTreeMap<String, f64>,
}

impl WeightVector {
    /// Equal weight for every symbol.
    pub fn uniform<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut weights: BTreeMap<String, f64> =
            symbols.into_iter().map(|s| (s.into(), 0.0)).collect();
        let share = 1.0 / weights.len().max(1) as f64;
        for w in weights.values_mut() {
            *w = share;
        }
        Self { weights }
    }

    /// Wrap raw values without normalizing. Negative or non-finite values
    /// are clamped to zero.
    pub fn from_raw(raw: BTreeMap<String, f64>) -> Self {
        Self {
            weights: raw
                .into_iter()
                .map(|(s, w)| (s, if w.is_finite() && w > 0.0 { w } else { 0.0 }))
                .collect(),
        }
    }

    /// Scale to sum to one. A vector with no positive mass becomes uniform.
    pub fn renormalized(self) -> Self {
        let total = self.sum();
        if total <= 0.0 || !total.is_finite() {
            return Self::uniform(self.weights.into_keys());
        }
        Self {
            weights: self
                .weights
                .into_iter()
                .map(|(s, w)| (s, w / total))
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.weights.get(symbol).copied()
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(|s| s.as_str())
    }

    /// (symbol, weight) pairs in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(s, w)| (s.as_str(), *w))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }
}

impl FromIterator<(String, f64)> for WeightVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self::from_raw(iter.into_iter().collect())
    }
}
