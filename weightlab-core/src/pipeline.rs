//! The allocation pipeline: explicit stages with typed outputs.
//!
//! ```text
//! validate → derive_metrics → aggregate → build_signals → adjust → allocate
//! ```
//!
//! Every stage is a pure function of its inputs. Randomness only enters in
//! `build_signals`, through per-symbol streams derived from the run seed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adjust::{adjust_weights, AdjustedWeights};
use crate::allocation::{allocate, Allocation, AllocationConfig, AllocationError};
use crate::domain::snapshot::CURRENT_PRICE;
use crate::domain::AssetData;
use crate::markov::{MarkovConfig, MarkovState};
use crate::rng::RngHierarchy;
use crate::scoring::metrics::{
    AVERAGE_VOLUME, MOMENTUM, PORTFOLIO_DIVERSITY, RELATIVE_VOLUME, SHARPE_RATIO, VOLUME_CHANGE,
};
use crate::scoring::{
    aggregate, score_diversity, score_momentum, score_sharpe, score_volume, DiversityBreakdown,
    DiversityWeights, FundamentalWeights, MetricTable, MomentumConfig, SharpeConfig, VolumeConfig,
    METRIC_DIRECTIONS,
};
use crate::signal_bank::{
    build_signals, SignalBank, SignalRow, TechnicalConfig, TechnicalConfigError,
};

/// Every tunable parameter of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub diversity: DiversityWeights,
    pub momentum: MomentumConfig,
    pub volume: VolumeConfig,
    pub sharpe: SharpeConfig,
    pub markov: MarkovConfig,
    pub technical: TechnicalConfig,
    pub allocation: AllocationConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.technical.validate()?;
        if self.volume.window == 0 {
            return Err(PipelineError::InvalidConfig("volume.window must be >= 1".into()));
        }
        if self.sharpe.periods_per_year == 0 {
            return Err(PipelineError::InvalidConfig(
                "sharpe.periods_per_year must be >= 1".into(),
            ));
        }
        if self.momentum.lookback_days <= 0 || self.momentum.tolerance_days < 0 {
            return Err(PipelineError::InvalidConfig(
                "momentum windows must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no assets to allocate")]
    NoAssets,

    #[error("asset {0} appears more than once")]
    DuplicateAsset(String),

    #[error("input contract violated for {symbol}: {reason}")]
    InputContractViolation { symbol: String, reason: String },

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("invalid technical config: {0}")]
    Technical(#[from] TechnicalConfigError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// Non-fatal outcome recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftIssue {
    /// A derived metric could not be computed for an asset.
    MissingSignal { symbol: String, signal: String },
    /// A metric had zero spread across the cohort and was left out.
    DegenerateNormalization { metric: String },
    /// No Markov prediction for an asset.
    UndefinedTransition { symbol: String, reason: String },
}

/// Identification of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub as_of: NaiveDate,
    pub budget: f64,
    pub seed: u64,
}

/// Assets trimmed to `as_of` and checked against the input contract.
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    pub assets: Vec<AssetData>,
}

/// Metric table plus the diversity breakdowns that produced one of its columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub table: MetricTable,
    pub diversity: BTreeMap<String, DiversityBreakdown>,
}

/// Everything a run produced, in stage order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub run: RunInfo,
    pub metrics: DerivedMetrics,
    pub fundamental: FundamentalWeights,
    pub signals: BTreeMap<String, SignalRow>,
    pub adjusted: AdjustedWeights,
    pub allocation: Allocation,
    pub issues: Vec<SoftIssue>,
}

impl AllocationReport {
    pub fn markov_predictions(&self) -> BTreeMap<&str, MarkovState> {
        self.signals
            .iter()
            .filter_map(|(s, row)| row.markov_state.map(|m| (s.as_str(), m)))
            .collect()
    }
}

// ── Stages ──

/// Check the input contract and drop bars dated after `as_of`.
pub fn validate(assets: &[AssetData], as_of: NaiveDate) -> Result<ValidatedInput, PipelineError> {
    if assets.is_empty() {
        return Err(PipelineError::NoAssets);
    }
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(assets.len());
    for asset in assets {
        let violation = |reason: &str| PipelineError::InputContractViolation {
            symbol: asset.symbol.clone(),
            reason: reason.to_string(),
        };
        if asset.symbol.trim().is_empty() {
            return Err(violation("empty symbol"));
        }
        if !seen.insert(asset.symbol.as_str()) {
            return Err(PipelineError::DuplicateAsset(asset.symbol.clone()));
        }
        let mut trimmed = asset.clone();
        trimmed.bars.retain(|b| b.date <= as_of);
        if trimmed.bars.is_empty() {
            return Err(violation("no price history on or before the as-of date"));
        }
        if trimmed.current_price().is_none() {
            return Err(violation("no current price"));
        }
        out.push(trimmed);
    }
    Ok(ValidatedInput { assets: out })
}

/// Snapshot fields plus the derived diversity, momentum, volume and Sharpe
/// columns.
pub fn derive_metrics(
    input: &ValidatedInput,
    as_of: NaiveDate,
    config: &PipelineConfig,
    issues: &mut Vec<SoftIssue>,
) -> DerivedMetrics {
    let assets = &input.assets;
    let mut table = MetricTable::with_symbols(assets.iter().map(|a| a.symbol.clone()));
    for asset in assets {
        for (field, value) in asset.snapshot.iter() {
            if field != CURRENT_PRICE {
                table.set(&asset.symbol, field, value);
            }
        }
    }

    let diversity = score_diversity(assets, config.diversity);
    let momentum = score_momentum(assets, as_of, &config.momentum);
    let volume = score_volume(assets, &config.volume);
    let sharpe = score_sharpe(assets, &config.sharpe);

    let diversity_column: BTreeMap<String, f64> = diversity
        .iter()
        .map(|(s, b)| (s.clone(), b.diversity))
        .collect();
    let columns: [(&str, &BTreeMap<String, f64>); 6] = [
        (PORTFOLIO_DIVERSITY, &diversity_column),
        (MOMENTUM, &momentum),
        (AVERAGE_VOLUME, &volume.average_volume),
        (RELATIVE_VOLUME, &volume.relative_volume),
        (VOLUME_CHANGE, &volume.volume_change),
        (SHARPE_RATIO, &sharpe),
    ];
    for (metric, values) in columns {
        table = table.with_column(metric, values);
        if metric == PORTFOLIO_DIVERSITY {
            continue;
        }
        for asset in assets {
            if !values.contains_key(&asset.symbol) {
                issues.push(SoftIssue::MissingSignal {
                    symbol: asset.symbol.clone(),
                    signal: metric.to_string(),
                });
            }
        }
    }
    debug!(
        assets = table.len(),
        metrics = table.metrics().len(),
        "derived metric table"
    );
    DerivedMetrics { table, diversity }
}

/// Fundamental aggregation, recording metrics that did not discriminate.
pub fn aggregate_stage(metrics: &DerivedMetrics, issues: &mut Vec<SoftIssue>) -> FundamentalWeights {
    let fundamental = aggregate(&metrics.table);
    for (metric, _) in METRIC_DIRECTIONS {
        let column: Vec<f64> = fundamental
            .normalized
            .column(metric)
            .into_iter()
            .filter_map(|(_, v)| v)
            .collect();
        if !column.is_empty() && column.iter().all(|v| v.is_nan()) {
            debug!(metric, "metric does not discriminate this run");
            issues.push(SoftIssue::DegenerateNormalization {
                metric: metric.to_string(),
            });
        }
    }
    fundamental
}

/// Signal bank over the validated assets.
pub fn signals_stage(
    input: &ValidatedInput,
    as_of: NaiveDate,
    config: &PipelineConfig,
    rngs: &RngHierarchy,
    issues: &mut Vec<SoftIssue>,
) -> BTreeMap<String, SignalRow> {
    let SignalBank {
        rows,
        markov_failures,
    } = build_signals(&input.assets, as_of, &config.technical, &config.markov, rngs);
    for (symbol, error) in markov_failures {
        issues.push(SoftIssue::UndefinedTransition {
            symbol,
            reason: error.to_string(),
        });
    }
    rows
}

/// Run every stage and return the full report.
pub fn run_pipeline(
    assets: &[AssetData],
    budget: f64,
    as_of: NaiveDate,
    seed: u64,
    config: &PipelineConfig,
) -> Result<AllocationReport, PipelineError> {
    config.validate()?;
    let input = validate(assets, as_of)?;
    let mut issues = Vec::new();

    let metrics = derive_metrics(&input, as_of, config, &mut issues);
    let fundamental = aggregate_stage(&metrics, &mut issues);
    let rngs = RngHierarchy::new(seed);
    let signals = signals_stage(&input, as_of, config, &rngs, &mut issues);
    let adjusted = adjust_weights(&fundamental.weights, &signals);
    let allocation = allocate(budget, &adjusted.weights, &config.allocation)?;

    if !issues.is_empty() {
        warn!(count = issues.len(), "run finished with soft issues");
    }
    info!(
        assets = input.assets.len(),
        funded = allocation.len(),
        budget,
        seed,
        "allocation complete"
    );

    Ok(AllocationReport {
        run: RunInfo {
            as_of,
            budget,
            seed,
        },
        metrics,
        fundamental,
        signals,
        adjusted,
        allocation,
        issues,
    })
}
