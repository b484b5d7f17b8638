//! WeightLab Core: signal scoring, Markov prediction, weight adjustment and
//! budget allocation.
//!
//! This crate contains the allocation pipeline:
//! - Domain types (bars, market snapshots, position records)
//! - Technical indicators and candlestick / support-resistance detectors
//! - Cross-sectional metric scoring and the fundamental aggregator
//! - Four-state Markov predictor with seedable per-symbol random streams
//! - Weight adjuster and cent-exact budget allocator
//! - The staged pipeline producing an `AllocationReport`

pub mod adjust;
pub mod allocation;
pub mod domain;
pub mod indicators;
pub mod markov;
pub mod patterns;
pub mod pipeline;
pub mod rng;
pub mod scoring;
pub mod signal_bank;
pub mod weights;

pub use allocation::{allocate, Allocation, AllocationConfig, AllocationError};
pub use domain::{AssetData, Bar, MarketSnapshot, PositionRecord};
pub use pipeline::{run_pipeline, AllocationReport, PipelineConfig, PipelineError, SoftIssue};
pub use weights::WeightVector;
