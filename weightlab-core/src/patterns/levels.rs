//! Support and resistance from local extrema of the close series.
//!
//! A point is a local minimum when it is `<=` every neighbour within `order`
//! positions on both sides (a local maximum uses `>=`). Neighbour indices past
//! either end are clipped to the boundary, so edge points compare against
//! themselves on the missing side.

use serde::{Deserialize, Serialize};

/// Latest support and resistance levels of one series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

impl Levels {
    pub fn from_closes(closes: &[f64], order: usize) -> Self {
        Self {
            support: latest_support(closes, order),
            resistance: latest_resistance(closes, order),
        }
    }
}

fn extrema(values: &[f64], order: usize, keep: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .filter(|&i| {
            values[i].is_finite()
                && (1..=order).all(|k| {
                    let left = i.saturating_sub(k);
                    let right = (i + k).min(n - 1);
                    keep(values[i], values[left]) && keep(values[i], values[right])
                })
        })
        .collect()
}

/// Indices of local minima.
pub fn local_minima(values: &[f64], order: usize) -> Vec<usize> {
    extrema(values, order, |x, other| x <= other)
}

/// Indices of local maxima.
pub fn local_maxima(values: &[f64], order: usize) -> Vec<usize> {
    extrema(values, order, |x, other| x >= other)
}

/// Value at the most recent local minimum.
pub fn latest_support(closes: &[f64], order: usize) -> Option<f64> {
    local_minima(closes, order).last().map(|&i| closes[i])
}

/// Value at the most recent local maximum.
pub fn latest_resistance(closes: &[f64], order: usize) -> Option<f64> {
    local_maxima(closes, order).last().map(|&i| closes[i])
}
