// =============================================================================
// Indicator Confluence — weighted agreement across the indicator set
// =============================================================================
//
// Each available indicator votes buy or sell with a fixed weight:
//
//   RSI        (2.0)  strong extreme (<25 / >75) full, mild (<35 / >65) half
//   Stochastic (1.5)  %K and %D both below 15 / both above 85
//   MACD       (2.0)  above signal and positive full, above signal half
//   SMA cross  (1.5)  SMA12 vs SMA30 aligned with price
//   Bollinger  (1.0)  price at or beyond a band
//
// The confluence percentage is the score over the total weight of the
// indicators that were actually available; above 60% a signal candidate is
// emitted in that direction.
// =============================================================================

use crate::indicators::IndicatorSnapshot;
use crate::signals::model::{PatternCandidate, PatternType};

const RSI_WEIGHT: f64 = 2.0;
const STOCH_WEIGHT: f64 = 1.5;
const MACD_WEIGHT: f64 = 2.0;
const SMA_WEIGHT: f64 = 1.5;
const BOLLINGER_WEIGHT: f64 = 1.0;

/// Confluence percentage required to emit a candidate.
const MIN_CONFLUENCE_PCT: f64 = 60.0;

/// Weighted buy/sell confluence over the available indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfluenceScore {
    pub buy_pct: f64,
    pub sell_pct: f64,
    pub total_weight: f64,
}

/// Score the indicator set; `None` when no scored indicator is available.
pub fn score_confluence(ind: &IndicatorSnapshot, price: f64) -> Option<ConfluenceScore> {
    let mut buy = 0.0;
    let mut sell = 0.0;
    let mut total = 0.0;

    if let Some(rsi) = ind.rsi {
        total += RSI_WEIGHT;
        if rsi < 25.0 {
            buy += RSI_WEIGHT;
        } else if rsi < 35.0 {
            buy += RSI_WEIGHT / 2.0;
        } else if rsi > 75.0 {
            sell += RSI_WEIGHT;
        } else if rsi > 65.0 {
            sell += RSI_WEIGHT / 2.0;
        }
    }

    if let (Some(k), Some(d)) = (ind.stoch_k, ind.stoch_d) {
        total += STOCH_WEIGHT;
        if k < 15.0 && d < 15.0 {
            buy += STOCH_WEIGHT;
        } else if k > 85.0 && d > 85.0 {
            sell += STOCH_WEIGHT;
        }
    }

    if let (Some(macd), Some(signal)) = (ind.macd, ind.macd_signal) {
        total += MACD_WEIGHT;
        if macd > signal {
            buy += if macd > 0.0 { MACD_WEIGHT } else { MACD_WEIGHT / 2.0 };
        } else if macd < signal {
            sell += if macd < 0.0 { MACD_WEIGHT } else { MACD_WEIGHT / 2.0 };
        }
    }

    if let (Some(sma_12), Some(sma_30)) = (ind.sma_12, ind.sma_30) {
        total += SMA_WEIGHT;
        if sma_12 > sma_30 && price > sma_12 {
            buy += SMA_WEIGHT;
        } else if sma_12 < sma_30 && price < sma_12 {
            sell += SMA_WEIGHT;
        }
    }

    if let (Some(upper), Some(lower)) = (ind.bb_upper, ind.bb_lower) {
        total += BOLLINGER_WEIGHT;
        if price <= lower {
            buy += BOLLINGER_WEIGHT;
        } else if price >= upper {
            sell += BOLLINGER_WEIGHT;
        }
    }

    if total == 0.0 {
        return None;
    }

    Some(ConfluenceScore {
        buy_pct: buy / total * 100.0,
        sell_pct: sell / total * 100.0,
        total_weight: total,
    })
}

/// Emit an INDICATORS_BUY / INDICATORS_SELL candidate when one side's
/// confluence exceeds the threshold.
pub fn detect_confluence(ind: &IndicatorSnapshot, price: f64) -> Option<PatternCandidate> {
    if price <= 0.0 {
        return None;
    }

    let score = score_confluence(ind, price)?;

    if score.buy_pct > MIN_CONFLUENCE_PCT {
        let reach = 0.02 * (score.buy_pct / 30.0).min(3.0);
        return Some(PatternCandidate {
            pattern: PatternType::IndicatorsBuy,
            entry: price * 1.002,
            target: price * (1.0 + reach),
            stop: price * 0.985,
            confidence: score.buy_pct.min(90.0),
        });
    }

    if score.sell_pct > MIN_CONFLUENCE_PCT {
        let reach = 0.02 * (score.sell_pct / 30.0).min(3.0);
        return Some(PatternCandidate {
            pattern: PatternType::IndicatorsSell,
            entry: price * 0.998,
            target: price * (1.0 - reach),
            stop: price * 1.015,
            confidence: score.sell_pct.min(90.0),
        });
    }

    None
}
