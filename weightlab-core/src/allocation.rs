//! Budget allocator: weights → exact cash split.
//!
//! Amounts are carried in integer cents so the final sum equals the budget
//! exactly. Steps:
//! 1. `raw = round(budget * weight)` per asset
//! 2. drop assets whose unrounded share is below the minimum allocation
//! 3. spread the reclaimed budget over the kept assets by weight
//! 4. reconcile the rounding residual: a positive one goes to the largest
//!    allocation, a negative one is taken from the largest allocations down
//!    to the floor. If the floor leaves no room, the lightest kept asset is
//!    dropped and the split repeats.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::weights::WeightVector;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Smallest permitted non-zero allocation, in currency units.
    pub minimum_allocation: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            minimum_allocation: 5.0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("budget must be a finite positive amount, got {0}")]
    InvalidBudget(f64),

    #[error("budget {budget} is below the minimum allocation {minimum}")]
    BudgetBelowMinimum { budget: f64, minimum: f64 },

    #[error("minimum allocation must be finite and non-negative, got {0}")]
    InvalidMinimum(f64),

    #[error("no weights to allocate")]
    EmptyWeights,

    #[error("weight for {symbol} must be finite and non-negative, got {weight}")]
    InvalidWeight { symbol: String, weight: f64 },

    #[error("cannot absorb a residual of {residual_cents} cents without breaching the minimum allocation")]
    AllocationFloorViolation { residual_cents: i64 },
}

/// Cash amount per symbol. Sums to the budget to the cent; every entry is at
/// least the minimum allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    cents: BTreeMap<String, i64>,
}

pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

impl Allocation {
    pub fn amount(&self, symbol: &str) -> Option<f64> {
        self.cents.get(symbol).map(|&c| from_cents(c))
    }

    pub fn cents(&self, symbol: &str) -> Option<i64> {
        self.cents.get(symbol).copied()
    }

    pub fn total_cents(&self) -> i64 {
        self.cents.values().sum()
    }

    pub fn total(&self) -> f64 {
        from_cents(self.total_cents())
    }

    pub fn len(&self) -> usize {
        self.cents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cents.is_empty()
    }

    /// (symbol, amount) pairs in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.cents.iter().map(|(s, &c)| (s.as_str(), from_cents(c)))
    }
}

impl Serialize for Allocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cents.len()))?;
        for (symbol, amount) in self.iter() {
            map.serialize_entry(symbol, &amount)?;
        }
        map.end()
    }
}

fn validate(
    budget: f64,
    weights: &WeightVector,
    config: &AllocationConfig,
) -> Result<(), AllocationError> {
    if !budget.is_finite() || budget <= 0.0 {
        return Err(AllocationError::InvalidBudget(budget));
    }
    let minimum = config.minimum_allocation;
    if !minimum.is_finite() || minimum < 0.0 {
        return Err(AllocationError::InvalidMinimum(minimum));
    }
    if budget < minimum {
        return Err(AllocationError::BudgetBelowMinimum { budget, minimum });
    }
    if weights.is_empty() {
        return Err(AllocationError::EmptyWeights);
    }
    if let Some((symbol, weight)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
        return Err(AllocationError::InvalidWeight {
            symbol: symbol.to_string(),
            weight,
        });
    }
    Ok(())
}

/// Split `budget` across `weights`.
pub fn allocate(
    budget: f64,
    weights: &WeightVector,
    config: &AllocationConfig,
) -> Result<Allocation, AllocationError> {
    validate(budget, weights, config)?;
    let budget_c = to_cents(budget);
    let floor_c = to_cents(config.minimum_allocation);

    // 2. the floor is tested on the unrounded share
    let mut kept: Vec<&str> = weights
        .iter()
        .filter(|(_, w)| *w > 0.0 && budget_c as f64 * w >= floor_c as f64)
        .map(|(s, _)| s)
        .collect();
    if kept.is_empty() {
        // Nothing clears the floor: the heaviest asset takes the budget.
        let heaviest = weights
            .iter()
            .fold(None::<(&str, f64)>, |best, (s, w)| match best {
                Some((_, bw)) if bw >= w => best,
                _ => Some((s, w)),
            });
        kept.extend(heaviest.map(|(s, _)| s));
    }

    loop {
        let mut cents = split(budget_c, &kept, weights);
        match reconcile(&mut cents, budget_c, floor_c) {
            Ok(()) => {
                debug!(
                    budget,
                    kept = cents.len(),
                    dropped = weights.len() - cents.len(),
                    "allocated budget"
                );
                return Ok(Allocation { cents });
            }
            Err(err) if kept.len() > 1 => {
                // drop the lightest asset (last symbol on ties) and split again
                let lightest = kept
                    .iter()
                    .enumerate()
                    .fold(None::<(usize, f64)>, |best, (i, s)| {
                        let w = weights.get(s).unwrap_or(0.0);
                        match best {
                            Some((_, bw)) if bw < w => best,
                            _ => Some((i, w)),
                        }
                    });
                if let Some((i, _)) = lightest {
                    let symbol = kept.remove(i);
                    debug!(symbol, %err, "dropping asset to absorb residual");
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Steps 1 and 3: raw cents per kept asset plus its share of the budget the
/// dropped assets left behind.
fn split(budget_c: i64, kept: &[&str], weights: &WeightVector) -> BTreeMap<String, i64> {
    let mut cents: BTreeMap<String, i64> = kept
        .iter()
        .map(|s| {
            let w = weights.get(s).unwrap_or(0.0);
            (s.to_string(), (budget_c as f64 * w).round() as i64)
        })
        .collect();
    let remaining = budget_c - cents.values().sum::<i64>();
    if remaining > 0 {
        let kept_weight: f64 = kept.iter().filter_map(|s| weights.get(s)).sum();
        let n = cents.len() as f64;
        for (symbol, c) in cents.iter_mut() {
            let share = if kept_weight > 0.0 {
                weights.get(symbol).unwrap_or(0.0) / kept_weight
            } else {
                1.0 / n
            };
            *c += (remaining as f64 * share).round() as i64;
        }
    }
    cents
}

fn reconcile(
    kept: &mut BTreeMap<String, i64>,
    budget_c: i64,
    floor_c: i64,
) -> Result<(), AllocationError> {
    let error = budget_c - kept.values().sum::<i64>();
    if error > 0 {
        let largest = kept
            .iter()
            .fold(None::<(&String, i64)>, |best, (s, &c)| match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((s, c)),
            })
            .map(|(s, _)| s.clone());
        if let Some(symbol) = largest {
            if let Some(c) = kept.get_mut(&symbol) {
                *c += error;
            }
        }
    } else if error < 0 {
        let mut residual = -error;
        let mut order: Vec<(String, i64)> = kept.iter().map(|(s, &c)| (s.clone(), c)).collect();
        // descending by amount, symbol order on ties
        order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (symbol, cents) in order {
            if residual == 0 {
                break;
            }
            let take = residual.min((cents - floor_c).max(0));
            if let Some(c) = kept.get_mut(&symbol) {
                *c -= take;
            }
            residual -= take;
        }
        if residual > 0 {
            return Err(AllocationError::AllocationFloorViolation {
                residual_cents: residual,
            });
        }
    }
    Ok(())
}
