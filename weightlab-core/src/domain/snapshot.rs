//! Current market snapshot: a flat set of named scalar fields per asset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot field carrying the current price.
pub const CURRENT_PRICE: &str = "current_price";

/// Flat snapshot of named scalar fields for one asset.
///
/// Absent fields are simply missing from the map. Non-finite values are
/// treated as absent by every accessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketSnapshot {
    fields: BTreeMap<String, f64>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Finite value of a field, if present.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied().filter(|v| v.is_finite())
    }

    pub fn set(&mut self, field: impl Into<String>, value: f64) {
        self.fields.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn current_price(&self) -> Option<f64> {
        self.get(CURRENT_PRICE)
    }

    /// Iterate finite fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| (k.as_str(), *v))
    }
}
