//! File-based runs: config on disk, bars/snapshot/portfolio fixtures in a
//! temp directory, artifacts and portfolio update checked after the run.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use tempfile::TempDir;

use weightlab_core::PositionRecord;
use weightlab_runner::data_loader::snake_case;
use weightlab_runner::export::save_artifacts;
use weightlab_runner::{apply_outcome, run_allocation, LoadError, RunConfig, RunError};

// ── Fixtures ─────────────────────────────────────────────────────────

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 4).unwrap()
}

const DAYS: i64 = 900;

fn as_of() -> NaiveDate {
    start_date() + Duration::days(DAYS - 1)
}

/// Deterministic wavy price path written as a bar CSV. Returns the last close.
fn write_bars(dir: &Path, symbol: &str, drift: f64, phase: f64) -> f64 {
    let mut csv = String::from("Date,Open,High,Low,Close,Volume\n");
    let mut close = 50.0;
    for i in 0..DAYS {
        let t = i as f64;
        let open = close;
        close = (close * (1.0 + drift + 0.015 * (t * 0.37 + phase).sin())).max(1.0);
        let high = open.max(close) * 1.004;
        let low = open.min(close) * 0.996;
        let volume = 1_000_000.0 + 250_000.0 * (t * 0.11 + phase).cos();
        let date = start_date() + Duration::days(i);
        writeln!(csv, "{date},{open:.4},{high:.4},{low:.4},{close:.4},{volume:.0}").unwrap();
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), csv).unwrap();
    close
}

struct Workspace {
    _tmp: TempDir,
    root: std::path::PathBuf,
}

impl Workspace {
    fn config_path(&self) -> std::path::PathBuf {
        self.root.join("weightlab.toml")
    }

    fn portfolio_path(&self) -> std::path::PathBuf {
        self.root.join("data/portfolio.json")
    }
}

fn workspace(extra_config: &str) -> Workspace {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    let bars = root.join("data/bars");
    std::fs::create_dir_all(&bars).unwrap();

    let aaa = write_bars(&bars, "AAA", 0.0006, 0.0);
    let bbb = write_bars(&bars, "BBB", 0.0001, 1.3);
    let ccc = write_bars(&bars, "CCC", 0.0003, 2.1);
    let etf = write_bars(&bars, "ETF", 0.0002, 0.7);

    let snapshot = format!(
        r#"{{
  "AAA": {{"currentPrice": {aaa}, "beta": 1.2, "trailingPE": 22.0, "marketCap": 2.0e9, "longName": "Alpha"}},
  "BBB": {{"currentPrice": {bbb}, "beta": 0.7, "trailingPE": 14.0, "marketCap": 8.0e9}},
  "CCC": {{"currentPrice": {ccc}, "beta": 1.0, "trailingPE": 30.0, "marketCap": 5.0e9}},
  "ETF": {{"navPrice": {etf}, "beta3Year": 0.9, "totalAssets": 4.0e10}}
}}"#
    );
    std::fs::write(root.join("data/snapshot.json"), snapshot).unwrap();

    let portfolio = format!(
        r#"[{{"ticker_symbol": "AAA", "stocks_owned": 10.0, "average_cost": {:.4}, "as_of_date": "2023-01-02"}}]"#,
        aaa * 0.9
    );
    std::fs::write(root.join("data/portfolio.json"), portfolio).unwrap();

    let config = format!(
        "budget = 1000.0\nas_of = \"{}\"\nseed = 42\n{extra_config}",
        as_of()
    );
    std::fs::write(root.join("weightlab.toml"), config).unwrap();

    Workspace { _tmp: tmp, root }
}

fn load(ws: &Workspace) -> RunConfig {
    RunConfig::from_file(&ws.config_path()).unwrap()
}

// ── Runs ─────────────────────────────────────────────────────────────

#[test]
fn run_allocates_whole_budget_across_discovered_symbols() {
    let ws = workspace("");
    let config = load(&ws);
    let (inputs, outcome) = run_allocation(&config).unwrap();

    let symbols: Vec<&str> = inputs.assets.iter().map(|a| a.symbol.as_str()).collect();
    assert_eq!(symbols, ["AAA", "BBB", "CCC", "ETF"]);

    let allocation = &outcome.report.allocation;
    assert_eq!(allocation.total_cents(), 100_000);
    assert!(allocation.iter().all(|(_, amount)| amount >= 5.0));
    assert_eq!(outcome.run_id, config.run_id());
    assert_eq!(outcome.report.run.as_of, as_of());
    assert_eq!(outcome.report.run.seed, 42);
}

#[test]
fn etf_snapshot_is_filled_before_the_run() {
    let ws = workspace("");
    let (inputs, _) = run_allocation(&load(&ws)).unwrap();
    let etf = inputs.assets.iter().find(|a| a.symbol == "ETF").unwrap();
    assert!(etf.snapshot.current_price().is_some());
    assert_eq!(etf.snapshot.get("beta"), Some(0.9));
    assert_eq!(etf.snapshot.get("market_cap"), Some(4.0e10));
}

#[test]
fn same_config_same_allocation() {
    let ws = workspace("");
    let config = load(&ws);
    let (_, a) = run_allocation(&config).unwrap();
    let (_, b) = run_allocation(&config).unwrap();
    assert_eq!(a.report.allocation, b.report.allocation);
    assert_eq!(a.run_id, b.run_id);
}

#[test]
fn explicit_symbol_list_restricts_the_run() {
    let ws = workspace("[data]\nsymbols = [\"BBB\", \"CCC\"]\n");
    let (inputs, outcome) = run_allocation(&load(&ws)).unwrap();
    assert_eq!(inputs.assets.len(), 2);
    assert!(outcome.report.allocation.amount("AAA").is_none());
    assert_eq!(outcome.report.allocation.total_cents(), 100_000);
}

// ── Failures ─────────────────────────────────────────────────────────

#[test]
fn missing_snapshot_entry_names_symbol() {
    let ws = workspace("");
    std::fs::write(
        ws.root.join("data/bars/ZZZ.csv"),
        "Date,Open,High,Low,Close,Volume\n2023-01-02,1,1,1,1,1\n",
    )
    .unwrap();
    let err = run_allocation(&load(&ws)).unwrap_err();
    match err {
        RunError::Data(LoadError::MissingSnapshot { symbol, .. }) => assert_eq!(symbol, "ZZZ"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_bar_file_is_a_data_error() {
    let ws = workspace("[data]\nsymbols = [\"AAA\", \"NOPE\"]\n");
    let err = run_allocation(&load(&ws)).unwrap_err();
    assert!(matches!(err, RunError::Data(LoadError::Io { .. })));
    assert!(err.to_string().contains("NOPE.csv"));
}

#[test]
fn as_of_before_history_violates_input_contract() {
    let ws = workspace("");
    let mut config = load(&ws);
    config.as_of = NaiveDate::from_ymd_opt(2020, 1, 1);
    let err = run_allocation(&config).unwrap_err();
    assert!(matches!(err, RunError::Pipeline(_)));
}

// ── Artifacts and portfolio update ───────────────────────────────────

#[test]
fn artifacts_written() {
    let ws = workspace("");
    let config = load(&ws);
    let (_, outcome) = run_allocation(&config).unwrap();
    let dir = save_artifacts(&outcome, &config.output.dir).unwrap();

    for name in ["report.json", "allocation.csv", "signals.csv", "summary.md"] {
        assert!(dir.join(name).exists(), "{name} missing");
    }

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["schema_version"], 1);
    assert_eq!(report["run_id"], outcome.run_id.as_str());

    let csv = std::fs::read_to_string(dir.join("allocation.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("symbol,amount,weight"));
    let total: f64 = lines
        .map(|l| l.split(',').nth(1).unwrap().parse::<f64>().unwrap())
        .sum();
    assert!((total - 1000.0).abs() < 1e-6);
}

#[test]
fn apply_updates_portfolio_file() {
    let ws = workspace("");
    let config = load(&ws);
    let (inputs, outcome) = run_allocation(&config).unwrap();
    let updated = apply_outcome(&config, &inputs, &outcome).unwrap();

    let aaa_funded = outcome.report.allocation.amount("AAA").is_some();
    let expected = 1 + outcome.report.allocation.len() - usize::from(aaa_funded);
    assert_eq!(updated.len(), expected);

    let saved: Vec<PositionRecord> =
        serde_json::from_str(&std::fs::read_to_string(ws.portfolio_path()).unwrap()).unwrap();
    assert_eq!(saved, updated);

    let aaa = saved.iter().find(|p| p.symbol == "AAA").unwrap();
    if aaa_funded {
        assert!(aaa.units > 10.0);
        assert_eq!(aaa.as_of, as_of());
    } else {
        assert_eq!(aaa.units, 10.0);
    }
}

#[test]
fn missing_portfolio_file_runs_as_empty_portfolio() {
    let ws = workspace("");
    std::fs::remove_file(ws.portfolio_path()).unwrap();
    let (inputs, outcome) = run_allocation(&load(&ws)).unwrap();
    assert!(inputs.positions.is_empty());
    assert_eq!(outcome.report.allocation.total_cents(), 100_000);
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn snake_case_is_idempotent(name in "[a-zA-Z][a-zA-Z0-9]{0,20}") {
        let once = snake_case(&name);
        prop_assert_eq!(snake_case(&once), once.clone());
        prop_assert!(!once.chars().any(|c| c.is_ascii_uppercase()));
        prop_assert!(!once.contains("__"));
    }
}
