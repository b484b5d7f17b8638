//! Input loading for the runner.
//!
//! Three local sources feed a run:
//! 1. `<bars_dir>/<SYMBOL>.csv`: daily bars with a `Date,Open,High,Low,Close,Volume` header
//! 2. a snapshot JSON object: symbol → flat map of numeric fields
//! 3. a portfolio JSON array of position records
//!
//! Snapshot keys are normalized to snake_case so files written with
//! camelCase provider names (`trailingPE`, `marketCap`) load unchanged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use weightlab_core::{AssetData, Bar, MarketSnapshot, PositionRecord};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed bar file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("bad row in {path} for '{symbol}': {reason}")]
    BadRow {
        path: PathBuf,
        symbol: String,
        reason: String,
    },

    #[error("no bars in {path} for '{symbol}'")]
    EmptyBars { path: PathBuf, symbol: String },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {path} has no entry for '{symbol}'")]
    MissingSnapshot { path: PathBuf, symbol: String },

    #[error("no bar files found in {0}")]
    NoSymbols(PathBuf),
}

/// Raw CSV row before validation.
#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
}

/// Snapshot field names that do not follow from plain snake_casing.
const SNAPSHOT_ALIASES: &[(&str, &str)] = &[("price_to_sales_trailing_12_months", "price_to_sales")];

fn read_to_string(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse one symbol's bars from CSV text.
///
/// Rows come back ascending by date with duplicate dates collapsed (the
/// later row wins). Timestamps are accepted as long as they start with a
/// `YYYY-MM-DD` date.
pub fn parse_bars(path: &Path, symbol: &str, content: &str) -> Result<Vec<Bar>, LoadError> {
    let bad_row = |reason: String| LoadError::BadRow {
        path: path.to_path_buf(),
        symbol: symbol.to_string(),
        reason,
    };

    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
    for record in reader.deserialize::<CsvBar>() {
        let row = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let day = row.date.get(..10).unwrap_or(&row.date);
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| bad_row(format!("date '{}': {e}", row.date)))?;
        if !(row.close.is_finite() && row.close > 0.0) {
            return Err(bad_row(format!("non-positive close {} on {date}", row.close)));
        }
        if !row.volume.is_finite() || row.volume < 0.0 {
            return Err(bad_row(format!("invalid volume {} on {date}", row.volume)));
        }
        by_date.insert(
            date,
            Bar {
                symbol: symbol.to_string(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.round() as u64,
            },
        );
    }

    if by_date.is_empty() {
        return Err(LoadError::EmptyBars {
            path: path.to_path_buf(),
            symbol: symbol.to_string(),
        });
    }
    Ok(by_date.into_values().collect())
}

/// Load `<dir>/<symbol>.csv`.
pub fn load_bars(dir: &Path, symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let path = dir.join(format!("{symbol}.csv"));
    let content = read_to_string(&path)?;
    let bars = parse_bars(&path, symbol, &content)?;
    debug!(symbol, bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Symbols with a bar file in `dir`, sorted.
pub fn discover_symbols(dir: &Path) -> Result<Vec<String>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut symbols = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            symbols.push(stem.to_string());
        }
    }
    symbols.sort();
    if symbols.is_empty() {
        return Err(LoadError::NoSymbols(dir.to_path_buf()));
    }
    Ok(symbols)
}

/// Convert a field name to snake_case.
///
/// Uppercase runs are one word (`trailingPE` → `trailing_pe`,
/// `EBITDAMargins` → `ebitda_margins`) and digit runs stand apart
/// (`beta3Year` → `beta_3_year`).
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == ' ' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if i > 0 && !out.ends_with('_') && !out.is_empty() {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let boundary = if c.is_ascii_uppercase() {
                prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase()))
            } else if c.is_ascii_digit() {
                !prev.is_ascii_digit()
            } else {
                prev.is_ascii_digit()
            };
            if boundary {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out.trim_end_matches('_').to_string()
}

fn normalize_field(name: &str) -> String {
    let snake = snake_case(name);
    SNAPSHOT_ALIASES
        .iter()
        .find(|(from, _)| *from == snake)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(snake)
}

/// Parse the snapshot file: symbol → snapshot.
///
/// Non-numeric values (strings, nulls, nested objects) are skipped.
pub fn parse_snapshots(
    path: &Path,
    content: &str,
) -> Result<BTreeMap<String, MarketSnapshot>, LoadError> {
    let raw: BTreeMap<String, BTreeMap<String, serde_json::Value>> =
        serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(raw
        .into_iter()
        .map(|(symbol, fields)| {
            let snapshot = MarketSnapshot::from_fields(
                fields
                    .into_iter()
                    .filter_map(|(k, v)| v.as_f64().map(|v| (normalize_field(&k), v))),
            );
            (symbol, snapshot)
        })
        .collect())
}

pub fn load_snapshots(path: &Path) -> Result<BTreeMap<String, MarketSnapshot>, LoadError> {
    let content = read_to_string(path)?;
    parse_snapshots(path, &content)
}

/// Load position records. A missing file is an empty portfolio.
pub fn load_portfolio(path: &Path) -> Result<Vec<PositionRecord>, LoadError> {
    if !path.exists() {
        warn!(path = %path.display(), "portfolio file not found, starting empty");
        return Ok(Vec::new());
    }
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Join bars, snapshots and positions into pipeline inputs.
///
/// Every symbol needs a snapshot entry. Positions for symbols outside
/// `symbols` are ignored.
pub fn assemble_assets(
    symbols: &[String],
    mut bars: BTreeMap<String, Vec<Bar>>,
    mut snapshots: BTreeMap<String, MarketSnapshot>,
    positions: &[PositionRecord],
    snapshot_path: &Path,
) -> Result<Vec<AssetData>, LoadError> {
    let mut assets = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let snapshot = snapshots
            .remove(symbol)
            .ok_or_else(|| LoadError::MissingSnapshot {
                path: snapshot_path.to_path_buf(),
                symbol: symbol.clone(),
            })?;
        let symbol_bars = bars.remove(symbol).unwrap_or_default();
        let mut asset = AssetData::new(symbol.clone(), symbol_bars, snapshot);
        if let Some(position) = positions.iter().find(|p| &p.symbol == symbol) {
            asset = asset.with_position(position.clone());
        }
        assets.push(asset);
    }
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Date,Open,High,Low,Close,Volume
2024-01-03,10.5,11,10,10.8,1200
2024-01-02,10,10.6,9.8,10.4,1000.0
2024-01-03 00:00:00-05:00,10.5,11.2,10,11.0,1300
";

    #[test]
    fn bars_sorted_and_deduplicated() {
        let bars = parse_bars(Path::new("AAA.csv"), "AAA", CSV).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 11.0);
        assert_eq!(bars[1].volume, 1300);
        assert_eq!(bars[0].symbol, "AAA");
    }

    #[test]
    fn rejects_non_positive_close() {
        let csv = "Date,Open,High,Low,Close,Volume\n2024-01-02,1,1,1,0,10\n";
        let err = parse_bars(Path::new("X.csv"), "X", csv).unwrap_err();
        match err {
            LoadError::BadRow { symbol, reason, .. } => {
                assert_eq!(symbol, "X");
                assert!(reason.contains("close"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_bad_date() {
        let csv = "Date,Open,High,Low,Close,Volume\n01/02/2024,1,1,1,1,10\n";
        assert!(matches!(
            parse_bars(Path::new("X.csv"), "X", csv),
            Err(LoadError::BadRow { .. })
        ));
    }

    #[test]
    fn header_only_is_empty() {
        let csv = "Date,Open,High,Low,Close,Volume\n";
        assert!(matches!(
            parse_bars(Path::new("X.csv"), "X", csv),
            Err(LoadError::EmptyBars { .. })
        ));
    }

    #[test]
    fn snake_case_cases() {
        assert_eq!(snake_case("trailingPE"), "trailing_pe");
        assert_eq!(snake_case("marketCap"), "market_cap");
        assert_eq!(snake_case("EBITDAMargins"), "ebitda_margins");
        assert_eq!(snake_case("beta3Year"), "beta_3_year");
        assert_eq!(snake_case("priceToSalesTrailing12Months"), "price_to_sales_trailing_12_months");
        assert_eq!(snake_case("current_price"), "current_price");
        assert_eq!(snake_case("navPrice"), "nav_price");
    }

    #[test]
    fn snapshot_keys_normalized_and_non_numbers_skipped() {
        let json = r#"{
            "AAA": {"currentPrice": 12.5, "trailingPE": 20, "longName": "Acme", "beta": null,
                    "priceToSalesTrailing12Months": 3.1},
            "BBB": {"current_price": 40.0}
        }"#;
        let snaps = parse_snapshots(Path::new("snap.json"), json).unwrap();
        let a = &snaps["AAA"];
        assert_eq!(a.current_price(), Some(12.5));
        assert_eq!(a.get("trailing_pe"), Some(20.0));
        assert_eq!(a.get("price_to_sales"), Some(3.1));
        assert!(!a.contains("beta"));
        assert_eq!(a.iter().count(), 3);
        assert_eq!(snaps["BBB"].current_price(), Some(40.0));
    }

    #[test]
    fn missing_portfolio_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let positions = load_portfolio(&dir.path().join("portfolio.json")).unwrap();
        assert!(positions.is_empty());
    }

    #[test]
    fn assemble_requires_snapshot() {
        let symbols = vec!["AAA".to_string()];
        let err = assemble_assets(
            &symbols,
            BTreeMap::new(),
            BTreeMap::new(),
            &[],
            Path::new("snap.json"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("AAA"));
    }

    #[test]
    fn assemble_attaches_positions() {
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];
        let snapshots = BTreeMap::from([
            ("AAA".to_string(), MarketSnapshot::from_fields([("current_price", 10.0)])),
            ("BBB".to_string(), MarketSnapshot::from_fields([("current_price", 20.0)])),
        ]);
        let positions = vec![PositionRecord {
            symbol: "BBB".into(),
            units: 3.0,
            average_cost: 18.0,
            as_of: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        }];
        let assets = assemble_assets(
            &symbols,
            BTreeMap::new(),
            snapshots,
            &positions,
            Path::new("snap.json"),
        )
        .unwrap();
        assert!(assets[0].position.is_none());
        assert_eq!(assets[1].position.as_ref().map(|p| p.units), Some(3.0));
    }
}
