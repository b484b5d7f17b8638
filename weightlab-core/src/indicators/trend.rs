//! Recent trend label: short SMA against long EMA.

use serde::{Deserialize, Serialize};

use super::series::{ewm, rolling_mean};
use crate::domain::bar::closes;
use crate::domain::Bar;

pub const SHORT_WINDOW: usize = 20;
pub const LONG_SPAN: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn name(self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

/// Trend on the latest bar: `Up` when SMA(20) is above EMA(90), `Down` when
/// below, `Flat` when equal or not yet computable.
pub fn recent_trend(bars: &[Bar]) -> Trend {
    let closes = closes(bars);
    let short = rolling_mean(&closes, SHORT_WINDOW);
    let long = ewm(&closes, LONG_SPAN);
    match (short.last(), long.last()) {
        (Some(&s), Some(&l)) if s.is_finite() && l.is_finite() => {
            if s > l {
                Trend::Up
            } else if s < l {
                Trend::Down
            } else {
                Trend::Flat
            }
        }
        _ => Trend::Flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn rising_prices_trend_up() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + i as f64).collect();
        assert_eq!(recent_trend(&make_bars(&closes)), Trend::Up);
    }

    #[test]
    fn falling_prices_trend_down() {
        let closes: Vec<f64> = (0..120).map(|i| 200.0 - i as f64).collect();
        assert_eq!(recent_trend(&make_bars(&closes)), Trend::Down);
    }

    #[test]
    fn short_history_is_flat() {
        assert_eq!(recent_trend(&make_bars(&[1.0, 2.0, 3.0])), Trend::Flat);
    }
}
