//! ETF snapshot filling.
//!
//! Funds report a different set of fields than equities. An asset whose
//! snapshot has none of the equity core fields is treated as an ETF, and each
//! missing core field is copied from its fund equivalent when present.

use tracing::debug;
use weightlab_core::MarketSnapshot;

/// Equity field → fund field it is filled from.
pub const ETF_FIELD_MAP: [(&str, &str); 5] = [
    ("current_price", "nav_price"),
    ("beta", "beta_3_year"),
    ("dividend_yield", "trailing_annual_dividend_yield"),
    ("market_cap", "total_assets"),
    ("return_on_equity", "three_year_average_return"),
];

/// True when the snapshot carries none of the equity core fields.
pub fn is_etf(snapshot: &MarketSnapshot) -> bool {
    ETF_FIELD_MAP
        .iter()
        .all(|(field, _)| !snapshot.contains(field))
}

/// Fill the core fields of an ETF snapshot. Returns the number of fields set.
pub fn fill_etf_fields(symbol: &str, snapshot: &mut MarketSnapshot) -> usize {
    if !is_etf(snapshot) {
        return 0;
    }
    let mut filled = 0;
    for (field, source) in ETF_FIELD_MAP {
        if let Some(value) = snapshot.get(source) {
            snapshot.set(field, value);
            filled += 1;
        }
    }
    debug!(symbol, filled, "filled ETF snapshot fields");
    filled
}
