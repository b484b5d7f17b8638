//! Per-asset input bundle consumed by the allocation pipeline.

use super::{Bar, MarketSnapshot, PositionRecord};

/// Everything the pipeline knows about one asset.
#[derive(Debug, Clone)]
pub struct AssetData {
    pub symbol: String,
    /// Daily bars, ascending by date.
    pub bars: Vec<Bar>,
    pub snapshot: MarketSnapshot,
    /// `None` when the asset is not currently held.
    pub position: Option<PositionRecord>,
}

impl AssetData {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>, snapshot: MarketSnapshot) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
            snapshot,
            position: None,
        }
    }

    pub fn with_position(mut self, position: PositionRecord) -> Self {
        self.position = Some(position);
        self
    }

    /// Current price: the snapshot price, falling back to the latest close.
    pub fn current_price(&self) -> Option<f64> {
        self.snapshot.current_price().or_else(|| {
            self.bars
                .last()
                .map(|b| b.close)
                .filter(|c| c.is_finite() && *c > 0.0)
        })
    }
}
