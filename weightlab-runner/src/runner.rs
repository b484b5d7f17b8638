//! Allocation runner: wires config, data loading and the core pipeline.
//!
//! Entry points:
//! - `load_inputs()`: reads bars, snapshots and positions named by the config.
//! - `run_with_inputs()`: runs the pipeline over already-loaded inputs.
//! - `run_allocation()`: both of the above. Used by the CLI.
//! - `apply_outcome()`: buys the allocation into the portfolio file.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use weightlab_core::{run_pipeline, AllocationReport, AssetData, PipelineError, PositionRecord};

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{
    assemble_assets, discover_symbols, load_bars, load_portfolio, load_snapshots, LoadError,
};
use crate::etf_fill::fill_etf_fields;
use crate::portfolio_update::{apply_allocation, save_portfolio};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Inputs read from disk for one run.
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub assets: Vec<AssetData>,
    /// Every position in the portfolio file, including unallocated symbols.
    pub positions: Vec<PositionRecord>,
}

/// Complete result of one allocation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub schema_version: u32,
    pub run_id: RunId,
    pub report: AllocationReport,
}

/// Evaluation date: the configured one, or today.
pub fn resolve_as_of(config: &RunConfig) -> NaiveDate {
    config
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

pub fn load_inputs(config: &RunConfig) -> Result<LoadedInputs, RunError> {
    let data = &config.data;
    let symbols = if data.symbols.is_empty() {
        discover_symbols(&data.bars_dir)?
    } else {
        data.symbols.clone()
    };

    let mut bars = BTreeMap::new();
    for symbol in &symbols {
        bars.insert(symbol.clone(), load_bars(&data.bars_dir, symbol)?);
    }

    let mut snapshots = load_snapshots(&data.snapshot)?;
    if data.fill_etf_fields {
        for (symbol, snapshot) in snapshots.iter_mut() {
            fill_etf_fields(symbol, snapshot);
        }
    }

    let positions = load_portfolio(&data.portfolio)?;
    let assets = assemble_assets(&symbols, bars, snapshots, &positions, &data.snapshot)?;
    info!(
        assets = assets.len(),
        positions = positions.len(),
        "inputs loaded"
    );
    Ok(LoadedInputs { assets, positions })
}

pub fn run_with_inputs(config: &RunConfig, inputs: &LoadedInputs) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let run_id = config.run_id();
    let as_of = resolve_as_of(config);
    let seed = config.effective_seed();
    info!(%run_id, %as_of, seed, budget = config.budget, "starting run");

    let report = run_pipeline(&inputs.assets, config.budget, as_of, seed, &config.pipeline)?;
    for issue in &report.issues {
        warn!(?issue, "soft issue");
    }
    Ok(RunOutcome {
        schema_version: SCHEMA_VERSION,
        run_id,
        report,
    })
}

/// Load inputs and run the pipeline.
pub fn run_allocation(config: &RunConfig) -> Result<(LoadedInputs, RunOutcome), RunError> {
    let inputs = load_inputs(config)?;
    let outcome = run_with_inputs(config, &inputs)?;
    Ok((inputs, outcome))
}

/// Apply the outcome's allocation to the positions and save the portfolio file.
pub fn apply_outcome(
    config: &RunConfig,
    inputs: &LoadedInputs,
    outcome: &RunOutcome,
) -> Result<Vec<PositionRecord>, RunError> {
    let updated = apply_allocation(
        &inputs.positions,
        &outcome.report.allocation,
        &inputs.assets,
        outcome.report.run.as_of,
    );
    save_portfolio(&config.data.portfolio, &updated)?;
    Ok(updated)
}
