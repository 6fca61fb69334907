// =============================================================================
// Double Bottom — two volume-confirmed troughs at close price levels
// =============================================================================
//
// Detection:
//   1. Local minima over a ±LOCAL_WINDOW sample window, kept only when the
//      trough's volume is at least 0.8x its trailing-20 average.
//   2. The most recent pair must be separated by at least MIN_SEPARATION
//      samples with a relative price gap under 1.5%.
//   3. The peak between the troughs must clear the lower trough by more
//      than 2%.
//
// A confirmed pattern is traded long above the second trough.
// =============================================================================

use crate::patterns::{is_local_min, trailing_avg};
use crate::signals::model::{PatternCandidate, PatternType};

/// Minimum series length before detection is attempted.
const MIN_TICKS: usize = 80;
/// Half-width of the local-minimum sliding window.
const LOCAL_WINDOW: usize = 20;
/// Minimum samples between the two troughs.
const MIN_SEPARATION: usize = 20;
/// Maximum relative gap between the trough prices.
const MAX_PRICE_GAP: f64 = 0.015;
/// Volume must reach this fraction of its trailing-20 average.
const VOLUME_FACTOR: f64 = 0.8;
/// Required peak height relative to the lower trough.
const MIN_PEAK_HEIGHT: f64 = 0.02;

/// Detect a double bottom over parallel low/high/volume arrays (oldest
/// first).  Returns at most one candidate.
pub fn detect_double_bottom(lows: &[f64], highs: &[f64], volumes: &[f64]) -> Option<PatternCandidate> {
    if lows.len() < MIN_TICKS || highs.len() != lows.len() || volumes.len() != lows.len() {
        return None;
    }

    // Volume-confirmed local minima: (index, low).
    let minima: Vec<(usize, f64)> = (0..lows.len())
        .filter(|&i| is_local_min(lows, i, LOCAL_WINDOW))
        .filter(|&i| volumes[i] >= VOLUME_FACTOR * trailing_avg(volumes, i, 20))
        .map(|i| (i, lows[i]))
        .collect();

    if minima.len() < 2 {
        return None;
    }

    let (first_idx, first_low) = minima[minima.len() - 2];
    let (second_idx, second_low) = minima[minima.len() - 1];

    if second_idx - first_idx < MIN_SEPARATION {
        return None;
    }

    let lower_low = first_low.min(second_low);
    let gap = (first_low - second_low).abs() / lower_low;
    if gap >= MAX_PRICE_GAP {
        return None;
    }

    // The rebound between the troughs must be meaningful.
    let peak = highs[first_idx..=second_idx]
        .iter()
        .fold(f64::MIN, |a, &b| a.max(b));
    let height = peak - lower_low;
    if height <= MIN_PEAK_HEIGHT * lower_low {
        return None;
    }

    let entry = second_low * 1.008;
    Some(PatternCandidate {
        pattern: PatternType::DoubleBottom,
        entry,
        target: entry + 0.8 * height,
        stop: second_low * 0.985,
        confidence: (50.0 + (1.0 - gap) * 35.0).min(85.0),
    })
}
