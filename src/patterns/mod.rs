// =============================================================================
// Pattern Detectors Module
// =============================================================================
//
// Pure detectors over an instrument's tick series.  Each detector returns at
// most one candidate trade setup; validation, cooldowns and uniqueness are
// the signal manager's concern, not the detectors'.

pub mod confluence;
pub mod double_bottom;
pub mod head_shoulders;
pub mod triangle;

use crate::indicators::IndicatorSnapshot;
use crate::signals::model::PatternCandidate;
use crate::types::PriceData;

pub use confluence::detect_confluence;
pub use double_bottom::detect_double_bottom;
pub use head_shoulders::detect_head_and_shoulders;
pub use triangle::detect_triangle_breakout;

/// Run every detector over the series and collect the candidates.
pub fn detect_all(history: &[PriceData], indicators: &IndicatorSnapshot) -> Vec<PatternCandidate> {
    let highs: Vec<f64> = history.iter().map(|t| t.high).collect();
    let lows: Vec<f64> = history.iter().map(|t| t.low).collect();
    let closes: Vec<f64> = history.iter().map(|t| t.close).collect();
    let volumes: Vec<f64> = history.iter().map(|t| t.volume).collect();

    let mut candidates = Vec::new();

    if let Some(c) = detect_double_bottom(&lows, &highs, &volumes) {
        candidates.push(c);
    }
    if let Some(c) = detect_head_and_shoulders(&highs, &volumes) {
        candidates.push(c);
    }
    if let Some(c) = detect_triangle_breakout(&highs, &lows, &closes) {
        candidates.push(c);
    }
    if let Some(price) = closes.last().copied() {
        if let Some(c) = detect_confluence(indicators, price) {
            candidates.push(c);
        }
    }

    candidates
}

/// Mean of the `n` values ending at `idx` (inclusive), clamped to the start
/// of the series.
pub(crate) fn trailing_avg(values: &[f64], idx: usize, n: usize) -> f64 {
    let start = idx.saturating_sub(n.saturating_sub(1));
    let window = &values[start..=idx];
    window.iter().sum::<f64>() / window.len() as f64
}

/// True when `values[idx]` is strictly the lowest within ±`window` samples.
/// Indices too close to either edge never qualify.
pub(crate) fn is_local_min(values: &[f64], idx: usize, window: usize) -> bool {
    if idx < window || idx + window >= values.len() {
        return false;
    }
    let center = values[idx];
    (idx - window..=idx + window)
        .filter(|&j| j != idx)
        .all(|j| values[j] > center)
}

/// True when `values[idx]` is strictly the highest within ±`window` samples.
pub(crate) fn is_local_max(values: &[f64], idx: usize, window: usize) -> bool {
    if idx < window || idx + window >= values.len() {
        return false;
    }
    let center = values[idx];
    (idx - window..=idx + window)
        .filter(|&j| j != idx)
        .all(|j| values[j] < center)
}
