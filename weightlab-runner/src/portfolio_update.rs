//! Applying an allocation to the position records.

use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};
use weightlab_core::{Allocation, AssetData, PositionRecord};

use crate::data_loader::LoadError;

/// Buy every funded symbol at its current price.
///
/// Existing records are updated in place; new symbols are appended in
/// symbol order. Symbols without a usable price are skipped with a warning.
pub fn apply_allocation(
    positions: &[PositionRecord],
    allocation: &Allocation,
    assets: &[AssetData],
    as_of: NaiveDate,
) -> Vec<PositionRecord> {
    let mut updated = positions.to_vec();
    for (symbol, amount) in allocation.iter() {
        if amount <= 0.0 {
            continue;
        }
        let Some(price) = assets
            .iter()
            .find(|a| a.symbol == symbol)
            .and_then(AssetData::current_price)
        else {
            warn!(symbol, amount, "no current price, allocation not applied");
            continue;
        };
        match updated.iter_mut().find(|p| p.symbol == symbol) {
            Some(record) => {
                record.buy(amount, price, as_of);
            }
            None => {
                let mut record = PositionRecord {
                    symbol: symbol.to_string(),
                    units: 0.0,
                    average_cost: 0.0,
                    as_of,
                };
                if record.buy(amount, price, as_of) {
                    updated.push(record);
                }
            }
        }
    }
    updated
}

/// Write position records as pretty JSON.
pub fn save_portfolio(path: &Path, positions: &[PositionRecord]) -> Result<(), LoadError> {
    let json = serde_json::to_string_pretty(positions).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), positions = positions.len(), "portfolio saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weightlab_core::{allocate, AllocationConfig, MarketSnapshot, WeightVector};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn asset(symbol: &str, price: f64) -> AssetData {
        AssetData::new(
            symbol,
            Vec::new(),
            MarketSnapshot::from_fields([("current_price", price)]),
        )
    }

    #[test]
    fn updates_existing_and_adds_new() {
        let positions = vec![PositionRecord {
            symbol: "AAA".into(),
            units: 10.0,
            average_cost: 100.0,
            as_of: date(1),
        }];
        let weights: WeightVector = [("AAA".to_string(), 0.5), ("BBB".to_string(), 0.5)]
            .into_iter()
            .collect();
        let allocation = allocate(1000.0, &weights, &AllocationConfig::default()).unwrap();
        let assets = vec![asset("AAA", 50.0), asset("BBB", 25.0)];

        let updated = apply_allocation(&positions, &allocation, &assets, date(20));
        assert_eq!(updated.len(), 2);

        let a = &updated[0];
        assert!((a.units - 20.0).abs() < 1e-9);
        assert!((a.average_cost - 75.0).abs() < 1e-9);
        assert_eq!(a.as_of, date(20));

        let b = &updated[1];
        assert_eq!(b.symbol, "BBB");
        assert!((b.units - 20.0).abs() < 1e-9);
        assert!((b.average_cost - 25.0).abs() < 1e-9);
    }

    #[test]
    fn skips_symbols_without_price() {
        let weights: WeightVector = [("AAA".to_string(), 1.0)].into_iter().collect();
        let allocation = allocate(100.0, &weights, &AllocationConfig::default()).unwrap();
        let assets = vec![AssetData::new("AAA", Vec::new(), MarketSnapshot::new())];
        assert!(apply_allocation(&[], &allocation, &assets, date(2)).is_empty());
    }

    #[test]
    fn save_writes_portfolio_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        let positions = vec![PositionRecord {
            symbol: "AAA".into(),
            units: 1.5,
            average_cost: 20.0,
            as_of: date(3),
        }];
        save_portfolio(&path, &positions).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"ticker_symbol\": \"AAA\""));
        assert!(text.contains("\"as_of_date\": \"2024-05-03\""));
    }
}
