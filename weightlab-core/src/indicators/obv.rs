//! On-Balance Volume (OBV).
//!
//! OBV[t] = OBV[t-1] + sign(close[t] - close[t-1]) * volume[t], OBV[0] = 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Default)]
pub struct OnBalanceVolume;

impl OnBalanceVolume {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for OnBalanceVolume {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut out = Vec::with_capacity(bars.len());
        let mut total = 0.0;
        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                let change = bar.close - bars[i - 1].close;
                if change.is_finite() && change != 0.0 {
                    total += change.signum() * bar.volume as f64;
                }
            }
            out.push(total);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn obv_accumulates_signed_volume() {
        // make_bars uses volume 1000
        let bars = make_bars(&[10.0, 11.0, 11.0, 9.0]);
        let obv = OnBalanceVolume::new().compute(&bars);
        assert_eq!(obv, vec![0.0, 1000.0, 1000.0, 0.0]);
    }
}
