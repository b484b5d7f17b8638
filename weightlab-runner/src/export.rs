//! Export of run results: JSON report, allocation and signal CSVs, and a
//! Markdown summary.
//!
//! The JSON report carries a `schema_version` field.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::runner::RunOutcome;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(outcome: &RunOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("failed to serialize run outcome to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Allocation as CSV. Columns: symbol, amount, weight.
///
/// `weight` is the adjusted weight the amount was derived from.
pub fn export_allocation_csv(outcome: &RunOutcome) -> Result<String> {
    let report = &outcome.report;
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["symbol", "amount", "weight"])?;
    for (symbol, weight) in report.adjusted.weights.iter() {
        let amount = report.allocation.amount(symbol).unwrap_or(0.0);
        wtr.write_record([
            symbol.to_string(),
            format!("{amount:.2}"),
            format!("{weight:.6}"),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Signal bank rows joined with their adjustment factor.
pub fn export_signals_csv(outcome: &RunOutcome) -> Result<String> {
    let report = &outcome.report;
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "price",
        "window",
        "sma",
        "ema",
        "volatility",
        "rsi",
        "macd",
        "macd_signal",
        "bollinger_upper",
        "bollinger_middle",
        "bollinger_lower",
        "obv",
        "trend",
        "support",
        "resistance",
        "markov_state",
        "patterns",
        "adjustment",
        "factor",
    ])?;
    for (symbol, row) in &report.signals {
        let breakdown = report.adjusted.breakdowns.get(symbol);
        let patterns: Vec<&str> = row.patterns.iter().map(|p| p.name()).collect();
        wtr.write_record([
            symbol.clone(),
            opt(row.price),
            row.window.to_string(),
            opt(row.sma),
            opt(row.ema),
            opt(row.volatility),
            opt(row.rsi),
            opt(row.macd),
            opt(row.macd_signal),
            opt(row.bollinger_upper),
            opt(row.bollinger_middle),
            opt(row.bollinger_lower),
            opt(row.obv),
            row.trend.name().to_string(),
            opt(row.support),
            opt(row.resistance),
            row.markov_state
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
            patterns.join(";"),
            opt(breakdown.map(|b| b.total())),
            opt(breakdown.map(|b| b.factor())),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown summary ───────────────────────────────────────────────

pub fn generate_summary(outcome: &RunOutcome) -> String {
    let report = &outcome.report;
    let mut md = String::with_capacity(1024);

    md.push_str("# Allocation Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", outcome.run_id));
    md.push_str(&format!("| As of | {} |\n", report.run.as_of));
    md.push_str(&format!("| Budget | {:.2} |\n", report.run.budget));
    md.push_str(&format!("| Seed | {} |\n", report.run.seed));
    md.push('\n');

    md.push_str("## Allocation\n\n");
    md.push_str("| Symbol | Fundamental | Adjusted | Amount |\n");
    md.push_str("| --- | ---: | ---: | ---: |\n");
    for (symbol, adjusted) in report.adjusted.weights.iter() {
        let fundamental = report.fundamental.weights.get(symbol).unwrap_or(0.0);
        let amount = report.allocation.amount(symbol).unwrap_or(0.0);
        md.push_str(&format!(
            "| {symbol} | {fundamental:.4} | {adjusted:.4} | {amount:.2} |\n"
        ));
    }
    md.push_str(&format!(
        "| **Total** | | | **{:.2}** |\n\n",
        report.allocation.total()
    ));

    if !report.issues.is_empty() {
        md.push_str("## Issues\n\n");
        for issue in &report.issues {
            let line = serde_json::to_string(issue).unwrap_or_else(|_| format!("{issue:?}"));
            md.push_str(&format!("- `{line}`\n"));
        }
        md.push('\n');
    }
    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run.
///
/// Creates `{as_of}_{run_id prefix}/` under `output_dir` containing
/// `report.json`, `allocation.csv`, `signals.csv` and `summary.md`.
/// Returns the path to the created directory.
pub fn save_artifacts(outcome: &RunOutcome, output_dir: &Path) -> Result<PathBuf> {
    let prefix = outcome.run_id.get(..12).unwrap_or(&outcome.run_id);
    let run_dir = output_dir.join(format!("{}_{prefix}", outcome.report.run.as_of));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("report.json", export_json(outcome)?),
        ("allocation.csv", export_allocation_csv(outcome)?),
        ("signals.csv", export_signals_csv(outcome)?),
        ("summary.md", generate_summary(outcome)),
    ];
    for (name, content) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(run_dir)
}
