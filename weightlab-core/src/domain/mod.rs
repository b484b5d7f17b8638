//! Domain types for WeightLab: bars, market snapshots, position records.

pub mod asset;
pub mod bar;
pub mod position;
pub mod snapshot;

pub use asset::AssetData;
pub use bar::Bar;
pub use position::PositionRecord;
pub use snapshot::MarketSnapshot;

/// Symbol type alias
pub type Symbol = String;
