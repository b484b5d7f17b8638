//! Price-pattern detectors: candlestick shapes and support/resistance levels.
//!
//! Detectors only read bars at or before the evaluated index.

pub mod candlestick;
pub mod levels;

pub use candlestick::{active_patterns, CandlestickPattern, PatternBias};
pub use levels::{latest_resistance, latest_support, local_maxima, local_minima, Levels};
