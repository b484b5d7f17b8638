use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Position record held by the investor.
///
/// Field names on the wire follow the portfolio file format
/// (`ticker_symbol`, `stocks_owned`, `average_cost`, `as_of_date`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(rename = "ticker_symbol")]
    pub symbol: String,
    #[serde(rename = "stocks_owned")]
    pub units: f64,
    pub average_cost: f64,
    #[serde(rename = "as_of_date")]
    pub as_of: NaiveDate,
}

impl PositionRecord {
    /// Cost basis of the position.
    pub fn total_cost(&self) -> f64 {
        self.units * self.average_cost
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.units * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.units * (current_price - self.average_cost)
    }

    /// Buy `amount` of cash worth at `price`, updating units and cost basis.
    ///
    /// Returns false (and leaves the record untouched) for a non-positive
    /// amount or price.
    pub fn buy(&mut self, amount: f64, price: f64, date: NaiveDate) -> bool {
        if amount <= 0.0 || price <= 0.0 || !amount.is_finite() || !price.is_finite() {
            return false;
        }
        let added_units = amount / price;
        let new_units = self.units + added_units;
        self.average_cost = (self.total_cost() + amount) / new_units;
        self.units = new_units;
        self.as_of = date;
        true
    }
}
