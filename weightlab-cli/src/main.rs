//! WeightLab CLI: allocation, signal inspection and config scaffolding.
//!
//! Commands:
//! - `allocate`: run the pipeline and write the allocation artifacts
//! - `signals`: print the signal bank and adjustment factors
//! - `init-config`: write a default `weightlab.toml`

mod logging;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use weightlab_runner::export::{export_signals_csv, save_artifacts};
use weightlab_runner::{apply_outcome, run_allocation, LoggingConfig, RunConfig, RunOutcome};

#[derive(Parser)]
#[command(
    name = "weightlab",
    about = "WeightLab CLI, signal-weighted portfolio allocation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a budget across the configured assets.
    Allocate {
        /// Path to a TOML config file.
        #[arg(long, default_value = "weightlab.toml")]
        config: PathBuf,

        /// Budget override.
        #[arg(long)]
        budget: Option<f64>,

        /// Seed override for the Markov sampling.
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluation date (YYYY-MM-DD). Defaults to the config value, then today.
        #[arg(long)]
        as_of: Option<String>,

        /// Output directory override.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Buy the allocation into the portfolio file.
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    /// Print signal bank rows and adjustment breakdowns.
    Signals {
        /// Path to a TOML config file.
        #[arg(long, default_value = "weightlab.toml")]
        config: PathBuf,

        /// Print JSON instead of CSV.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a default config file.
    InitConfig {
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Allocate {
            config,
            budget,
            seed,
            as_of,
            output_dir,
            apply,
        } => run_allocate_cmd(&config, budget, seed, as_of, output_dir, apply),
        Commands::Signals { config, json } => run_signals_cmd(&config, json),
        Commands::InitConfig { path, force } => run_init_config(&path, force),
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let config = RunConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    logging::init_logging(&config.logging);
    Ok(config)
}

fn run_allocate_cmd(
    config_path: &Path,
    budget: Option<f64>,
    seed: Option<u64>,
    as_of: Option<String>,
    output_dir: Option<PathBuf>,
    apply: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(budget) = budget {
        config.budget = budget;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    if let Some(date) = as_of.as_deref() {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of date '{date}'"))?;
        config.as_of = Some(parsed);
    }
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    config.validate().context("invalid configuration")?;

    let (inputs, outcome) = run_allocation(&config).context("allocation run failed")?;
    print_summary(&outcome);

    let run_dir = save_artifacts(&outcome, &config.output.dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    if apply {
        let updated = apply_outcome(&config, &inputs, &outcome)
            .context("failed to apply allocation to portfolio")?;
        println!(
            "Portfolio updated: {} ({} positions)",
            config.data.portfolio.display(),
            updated.len()
        );
    }
    Ok(())
}

fn run_signals_cmd(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let (_, outcome) = run_allocation(&config).context("signal run failed")?;
    let report = &outcome.report;

    if json {
        let value = serde_json::json!({
            "as_of": report.run.as_of,
            "signals": report.signals,
            "adjustments": report.adjusted.breakdowns,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", export_signals_csv(&outcome)?);
    }
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    logging::init_logging(&LoggingConfig::default());
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = RunConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    let short_id = outcome.run_id.get(..12).unwrap_or(&outcome.run_id);
    println!("Run {short_id} (as of {})", report.run.as_of);
    println!(
        "Budget {:.2}, seed {}, {} assets",
        report.run.budget,
        report.run.seed,
        report.adjusted.weights.len()
    );
    println!();
    println!("{:<8} {:>10} {:>10} {:>12}", "Symbol", "Weight", "Factor", "Amount");
    for (symbol, weight) in report.adjusted.weights.iter() {
        let factor = report
            .adjusted
            .breakdowns
            .get(symbol)
            .map(|b| b.factor())
            .unwrap_or(1.0);
        let amount = report.allocation.amount(symbol).unwrap_or(0.0);
        println!("{symbol:<8} {weight:>10.4} {factor:>10.3} {amount:>12.2}");
    }
    println!("{:<8} {:>10} {:>10} {:>12.2}", "Total", "", "", report.allocation.total());

    if !report.issues.is_empty() {
        println!();
        println!("{} soft issue(s); see report.json", report.issues.len());
    }
}
