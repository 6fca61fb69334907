// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the fixed indicator set computed
// over an instrument's series.  Every public function returns `Option<f64>`
// so callers are forced to handle insufficient-history scenarios — a missing
// value is data, not an error.

pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;

use serde::Serialize;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerResult};
pub use macd::{calculate_macd, MacdResult};
pub use moving_average::{calculate_ema, calculate_sma};
pub use rsi::calculate_rsi;
pub use stochastic::{calculate_stochastic, StochasticResult};

/// The complete indicator set over one instrument's series.  `None` fields
/// mean the history was too short for that indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub sma_12: Option<f64>,
    pub sma_30: Option<f64>,
    pub sma_60: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
    pub volume_sma: Option<f64>,
}

impl IndicatorSnapshot {
    /// `(name, value)` pairs in a stable order, for persistence and display.
    pub fn values(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("SMA_12", self.sma_12),
            ("SMA_30", self.sma_30),
            ("SMA_60", self.sma_60),
            ("EMA_12", self.ema_12),
            ("EMA_26", self.ema_26),
            ("RSI", self.rsi),
            ("STOCH_K", self.stoch_k),
            ("STOCH_D", self.stoch_d),
            ("MACD", self.macd),
            ("MACD_SIGNAL", self.macd_signal),
            ("MACD_HISTOGRAM", self.macd_histogram),
            ("BB_UPPER", self.bb_upper),
            ("BB_MIDDLE", self.bb_middle),
            ("BB_LOWER", self.bb_lower),
            ("ATR", self.atr),
            ("VOLUME_SMA", self.volume_sma),
        ]
    }
}

/// Compute the full indicator set over parallel OHLCV arrays (oldest first).
pub fn compute_all(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
) -> IndicatorSnapshot {
    let macd = calculate_macd(closes);
    let bollinger = calculate_bollinger(closes, 20, 2.0);
    let stochastic = calculate_stochastic(highs, lows, closes, 14);

    IndicatorSnapshot {
        sma_12: calculate_sma(closes, 12),
        sma_30: calculate_sma(closes, 30),
        sma_60: calculate_sma(closes, 60),
        ema_12: calculate_ema(closes, 12),
        ema_26: calculate_ema(closes, 26),
        rsi: calculate_rsi(closes, 14),
        stoch_k: stochastic.as_ref().map(|s| s.k),
        stoch_d: stochastic.as_ref().map(|s| s.d),
        macd: macd.as_ref().map(|m| m.macd),
        macd_signal: macd.as_ref().map(|m| m.signal),
        macd_histogram: macd.as_ref().map(|m| m.histogram),
        bb_upper: bollinger.as_ref().map(|b| b.upper),
        bb_middle: bollinger.as_ref().map(|b| b.middle),
        bb_lower: bollinger.as_ref().map(|b| b.lower),
        atr: calculate_atr(highs, lows, closes, 14),
        volume_sma: calculate_sma(volumes, 20),
    }
}
