//! Candlestick pattern detectors.
//!
//! Single-bar shapes use body/shadow ratios of the bar's own range.
//! Multi-bar shapes look back one or two bars; with too little history they
//! are simply inactive.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandlestickPattern {
    Doji,
    Hammer,
    InvertedHammer,
    ShootingStar,
    SpinningTop,
    Engulfing,
    Harami,
    PiercingLine,
    DarkCloudCover,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternBias {
    Bullish,
    Bearish,
    Neutral,
}

impl CandlestickPattern {
    pub const ALL: [CandlestickPattern; 13] = [
        CandlestickPattern::Doji,
        CandlestickPattern::Hammer,
        CandlestickPattern::InvertedHammer,
        CandlestickPattern::ShootingStar,
        CandlestickPattern::SpinningTop,
        CandlestickPattern::Engulfing,
        CandlestickPattern::Harami,
        CandlestickPattern::PiercingLine,
        CandlestickPattern::DarkCloudCover,
        CandlestickPattern::MorningStar,
        CandlestickPattern::EveningStar,
        CandlestickPattern::ThreeWhiteSoldiers,
        CandlestickPattern::ThreeBlackCrows,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CandlestickPattern::Doji => "doji",
            CandlestickPattern::Hammer => "hammer",
            CandlestickPattern::InvertedHammer => "inverted_hammer",
            CandlestickPattern::ShootingStar => "shooting_star",
            CandlestickPattern::SpinningTop => "spinning_top",
            CandlestickPattern::Engulfing => "engulfing",
            CandlestickPattern::Harami => "harami",
            CandlestickPattern::PiercingLine => "piercing_line",
            CandlestickPattern::DarkCloudCover => "dark_cloud_cover",
            CandlestickPattern::MorningStar => "morning_star",
            CandlestickPattern::EveningStar => "evening_star",
            CandlestickPattern::ThreeWhiteSoldiers => "three_white_soldiers",
            CandlestickPattern::ThreeBlackCrows => "three_black_crows",
        }
    }

    /// How an active pattern moves the weight adjustment.
    pub fn bias(self) -> PatternBias {
        use CandlestickPattern::*;
        match self {
            Hammer | InvertedHammer | MorningStar | ThreeWhiteSoldiers | PiercingLine
            | Engulfing | Doji => PatternBias::Bullish,
            ShootingStar | DarkCloudCover | EveningStar | ThreeBlackCrows | Harami => {
                PatternBias::Bearish
            }
            SpinningTop => PatternBias::Neutral,
        }
    }

    /// Whether the pattern completes at bar `i`.
    pub fn detect(self, bars: &[Bar], i: usize) -> bool {
        let Some(cur) = bars.get(i) else {
            return false;
        };
        let prev = i.checked_sub(1).and_then(|j| bars.get(j));
        let prev2 = i.checked_sub(2).and_then(|j| bars.get(j));

        use CandlestickPattern::*;
        match self {
            Doji => is_doji(cur),
            Hammer => {
                cur.body() <= cur.range() * 0.3
                    && cur.lower_shadow() >= 2.0 * cur.body()
                    && cur.upper_shadow() <= cur.body() * 0.3
            }
            InvertedHammer => {
                cur.body() <= cur.range() * 0.3
                    && cur.upper_shadow() >= 2.0 * cur.body()
                    && cur.lower_shadow() <= cur.body() * 0.3
            }
            ShootingStar => {
                cur.body() <= cur.range() * 0.3
                    && cur.upper_shadow() >= 2.0 * cur.body()
                    && cur.lower_shadow() <= cur.body() * 0.1
            }
            SpinningTop => {
                cur.body() <= cur.range() * 0.1
                    && cur.upper_shadow() >= cur.body()
                    && cur.lower_shadow() >= cur.body()
            }
            Engulfing => prev.is_some_and(|p| {
                cur.body() > p.body() && sign(cur.signed_body()) != sign(p.signed_body())
            }),
            Harami => prev.is_some_and(|p| {
                cur.body() < p.body() && sign(cur.signed_body()) != sign(p.signed_body())
            }),
            PiercingLine => prev.is_some_and(|p| {
                cur.open < p.close && cur.close > p.open + (p.close - p.open) / 2.0
            }),
            DarkCloudCover => prev.is_some_and(|p| {
                cur.open > p.close && cur.close < p.open + (p.close - p.open) / 2.0
            }),
            MorningStar => match (prev2, prev) {
                (Some(first), Some(star)) => {
                    first.close > first.open
                        && is_doji(star)
                        && cur.open < star.close
                        && cur.close > first.open
                }
                _ => false,
            },
            EveningStar => match (prev2, prev) {
                (Some(first), Some(star)) => {
                    first.close < first.open
                        && is_doji(star)
                        && cur.open > star.close
                        && cur.close < first.open
                }
                _ => false,
            },
            ThreeWhiteSoldiers => match (prev2, prev) {
                (Some(a), Some(b)) => {
                    a.close > a.open
                        && b.close > b.open
                        && cur.close > cur.open
                        && a.close < b.close
                        && b.close < cur.close
                }
                _ => false,
            },
            ThreeBlackCrows => match (prev2, prev) {
                (Some(a), Some(b)) => {
                    a.close < a.open
                        && b.close < b.open
                        && cur.close < cur.open
                        && a.close > b.close
                        && b.close > cur.close
                }
                _ => false,
            },
        }
    }
}

fn is_doji(bar: &Bar) -> bool {
    bar.body() <= bar.range() * 0.1
}

// Sign with zero as its own class.
fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Patterns active on the latest bar, in declaration order.
pub fn active_patterns(bars: &[Bar]) -> Vec<CandlestickPattern> {
    let Some(last) = bars.len().checked_sub(1) else {
        return Vec::new();
    };
    CandlestickPattern::ALL
        .into_iter()
        .filter(|p| p.detect(bars, last))
        .collect()
}
