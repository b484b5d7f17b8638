//! WeightLab Runner: file-based orchestration of allocation runs.
//!
//! This crate builds on `weightlab-core` to provide:
//! - TOML run configuration with a content-addressed run id
//! - Loading of CSV bars, JSON snapshots and the JSON portfolio
//! - ETF snapshot filling
//! - Report export (JSON, CSV, Markdown)
//! - Applying an allocation to the portfolio file

pub mod config;
pub mod data_loader;
pub mod etf_fill;
pub mod export;
pub mod portfolio_update;
pub mod runner;

pub use config::{ConfigError, DataConfig, LogFormat, LoggingConfig, OutputConfig, RunConfig, RunId};
pub use data_loader::LoadError;
pub use runner::{
    apply_outcome, load_inputs, resolve_as_of, run_allocation, run_with_inputs, LoadedInputs,
    RunError, RunOutcome, SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn run_config_is_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn run_outcome_is_send_sync() {
        assert_send::<RunOutcome>();
        assert_sync::<RunOutcome>();
        assert_send::<LoadedInputs>();
        assert_sync::<LoadedInputs>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
