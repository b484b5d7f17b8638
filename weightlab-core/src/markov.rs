//! Four-state Markov model of daily price direction.
//!
//! Daily percentage changes are bucketed by thresholds derived from their own
//! mean and sample standard deviation:
//!
//! | state | condition |
//! |---|---|
//! | `StrongDown` | `c <= -significant` |
//! | `MildDown` | `-significant < c <= -minor` |
//! | `Neutral` | `-minor < c <= minor` |
//! | `Up` | otherwise |
//!
//! with `significant = mean + std` and `minor = mean`. The transition matrix
//! is the row-normalized count of consecutive state pairs. Everything is
//! recomputed from scratch on each call.

use chrono::NaiveDate;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{bar, Bar};
use crate::indicators::series;

pub const NUM_STATES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkovState {
    StrongDown = 0,
    MildDown = 1,
    Neutral = 2,
    Up = 3,
}

impl MarkovState {
    pub const ALL: [MarkovState; NUM_STATES] = [
        MarkovState::StrongDown,
        MarkovState::MildDown,
        MarkovState::Neutral,
        MarkovState::Up,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            MarkovState::StrongDown => "strong_down",
            MarkovState::MildDown => "mild_down",
            MarkovState::Neutral => "neutral",
            MarkovState::Up => "up",
        }
    }

    /// States 0 and 1 predict a decline.
    pub fn is_bearish(self) -> bool {
        matches!(self, MarkovState::StrongDown | MarkovState::MildDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    /// Trailing history used to fit the model, in years before `as_of`.
    pub lookback_years: u32,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self { lookback_years: 3 }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarkovError {
    #[error("need at least 2 daily changes to fit thresholds, got {0}")]
    InsufficientData(usize),

    #[error("state {0:?} has no observed successor")]
    UndefinedTransition(MarkovState),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub significant: f64,
    pub minor: f64,
}

impl Thresholds {
    /// `significant = mean + std`, `minor = mean` over finite changes.
    pub fn fit(changes: &[f64]) -> Result<Self, MarkovError> {
        let finite = changes.iter().filter(|c| c.is_finite()).count();
        match (series::mean(changes), series::sample_std(changes)) {
            (Some(mean), Some(std)) => Ok(Self {
                significant: mean + std,
                minor: mean,
            }),
            _ => Err(MarkovError::InsufficientData(finite)),
        }
    }

    pub fn classify(&self, change: f64) -> MarkovState {
        if change <= -self.significant {
            MarkovState::StrongDown
        } else if change <= -self.minor {
            MarkovState::MildDown
        } else if change <= self.minor {
            MarkovState::Neutral
        } else {
            MarkovState::Up
        }
    }
}

/// Row-stochastic 4×4 matrix; a row is `None` when the state never had a
/// successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    rows: [Option<[f64; NUM_STATES]>; NUM_STATES],
}

impl TransitionMatrix {
    pub fn from_states(states: &[MarkovState]) -> Self {
        let mut counts = [[0u64; NUM_STATES]; NUM_STATES];
        for pair in states.windows(2) {
            counts[pair[0].index()][pair[1].index()] += 1;
        }
        let rows = counts.map(|row| {
            let total: u64 = row.iter().sum();
            (total > 0).then(|| row.map(|c| c as f64 / total as f64))
        });
        Self { rows }
    }

    pub fn row(&self, from: MarkovState) -> Option<&[f64; NUM_STATES]> {
        self.rows[from.index()].as_ref()
    }

    /// P(next = `to` | current = `from`).
    pub fn probability(&self, from: MarkovState, to: MarkovState) -> Option<f64> {
        self.row(from).map(|r| r[to.index()])
    }

    /// Sample a successor of `from`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        from: MarkovState,
        rng: &mut R,
    ) -> Result<MarkovState, MarkovError> {
        let row = self.row(from).ok_or(MarkovError::UndefinedTransition(from))?;
        let dist =
            WeightedIndex::new(row.iter()).map_err(|_| MarkovError::UndefinedTransition(from))?;
        let next = dist.sample(rng);
        MarkovState::from_index(next).ok_or(MarkovError::UndefinedTransition(from))
    }
}

/// A fitted model: thresholds, state sequence and transition matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovModel {
    pub thresholds: Thresholds,
    pub states: Vec<MarkovState>,
    pub matrix: TransitionMatrix,
}

impl MarkovModel {
    /// Fit on a close-price series.
    pub fn fit(closes: &[f64]) -> Result<Self, MarkovError> {
        let changes: Vec<f64> = series::pct_change(closes)
            .into_iter()
            .filter(|c| c.is_finite())
            .collect();
        let thresholds = Thresholds::fit(&changes)?;
        let states: Vec<MarkovState> = changes.iter().map(|&c| thresholds.classify(c)).collect();
        let matrix = TransitionMatrix::from_states(&states);
        Ok(Self {
            thresholds,
            states,
            matrix,
        })
    }

    /// Fit on the trailing `lookback_years` of bars up to and including `as_of`.
    pub fn fit_bars(
        bars: &[Bar],
        as_of: NaiveDate,
        config: &MarkovConfig,
    ) -> Result<Self, MarkovError> {
        let window = bar::trailing_years(bars, as_of, config.lookback_years);
        Self::fit(&bar::closes(window))
    }

    pub fn current_state(&self) -> Option<MarkovState> {
        self.states.last().copied()
    }

    /// Sample the successor of the latest observed state.
    pub fn predict<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<MarkovState, MarkovError> {
        let current = self
            .current_state()
            .ok_or(MarkovError::InsufficientData(0))?;
        self.matrix.sample(current, rng)
    }
}

/// Fit and predict in one call.
pub fn predict_next_state<R: Rng + ?Sized>(
    bars: &[Bar],
    as_of: NaiveDate,
    config: &MarkovConfig,
    rng: &mut R,
) -> Result<MarkovState, MarkovError> {
    MarkovModel::fit_bars(bars, as_of, config)?.predict(rng)
}
