//! Cross-sectional scoring: metric table, normalization, derived metrics and
//! the fundamental aggregator.

pub mod diversity;
pub mod fundamental;
pub mod metrics;
pub mod momentum;
pub mod normalize;
pub mod sharpe;
pub mod volume;

pub use diversity::{score_diversity, DiversityBreakdown, DiversityWeights};
pub use fundamental::{aggregate, FundamentalWeights};
pub use metrics::{direction_of, MetricDirection, MetricRow, MetricTable, METRIC_DIRECTIONS};
pub use momentum::{find_nearest_date, momentum, score_momentum, MomentumConfig};
pub use normalize::{normalize, normalize_column, normalize_map};
pub use sharpe::{score_sharpe, sharpe_ratio, SharpeConfig};
pub use volume::{score_volume, volume_signals, VolumeConfig, VolumeScores, VolumeSignals};
