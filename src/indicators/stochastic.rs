// =============================================================================
// Stochastic Oscillator — %K and %D
// =============================================================================
//
//   %K = (close - lowestLow) / (highestHigh - lowestLow) * 100
//
// over the trailing `period` samples.  %D is the 3-sample mean of the three
// most recent %K values, each reconstructed from its own shifted window; when
// the series is too short for three %K values, %D equals %K.
//
// A flat window (highest high == lowest low) reads 50.0 — neutral.
// =============================================================================

/// Result of a stochastic oscillator calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticResult {
    pub k: f64,
    pub d: f64,
}

/// %K over the trailing `period` window ending at `end` (exclusive).
fn percent_k(highs: &[f64], lows: &[f64], closes: &[f64], period: usize, end: usize) -> f64 {
    let window_high = highs[end - period..end]
        .iter()
        .fold(f64::MIN, |a, &b| a.max(b));
    let window_low = lows[end - period..end].iter().fold(f64::MAX, |a, &b| a.min(b));
    let close = closes[end - 1];

    let range = window_high - window_low;
    if range == 0.0 {
        return 50.0;
    }

    (close - window_low) / range * 100.0
}

/// Compute %K and %D over the trailing `period` samples.
///
/// Returns `None` when `period` is zero, the arrays differ in length, or
/// fewer than `period` samples are available.
pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Option<StochasticResult> {
    let len = closes.len();
    if period == 0 || len < period || highs.len() != len || lows.len() != len {
        return None;
    }

    let k = percent_k(highs, lows, closes, period, len);

    // %D: mean of the three most recent %K values, windows shifted back one
    // sample each.  Falls back to %K itself when history is too short.
    let d = if len >= period + 2 {
        let k1 = percent_k(highs, lows, closes, period, len - 1);
        let k2 = percent_k(highs, lows, closes, period, len - 2);
        (k + k1 + k2) / 3.0
    } else {
        k
    };

    (k.is_finite() && d.is_finite()).then_some(StochasticResult { k, d })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stochastic_insufficient_data() {
        let data = vec![1.0; 13];
        assert_eq!(calculate_stochastic(&data, &data, &data, 14), None);
    }

    #[test]
    fn close_at_window_high_reads_100() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let result = calculate_stochastic(&closes, &closes, &closes, 14).unwrap();
        // Monotone rise: every close sits at its window high.
        assert!((result.k - 100.0).abs() < 1e-10);
        assert!((result.d - 100.0).abs() < 1e-10);
    }

    #[test]
    fn close_at_window_low_reads_0() {
        let closes: Vec<f64> = (1..=20).rev().map(|x| x as f64).collect();
        let result = calculate_stochastic(&closes, &closes, &closes, 14).unwrap();
        assert!(result.k.abs() < 1e-10);
        assert!(result.d.abs() < 1e-10);
    }

    #[test]
    fn flat_window_is_neutral() {
        let data = vec![100.0; 20];
        let result = calculate_stochastic(&data, &data, &data, 14).unwrap();
        assert_eq!(result.k, 50.0);
        assert_eq!(result.d, 50.0);
    }

    #[test]
    fn d_equals_k_when_history_barely_suffices() {
        // Exactly `period` samples: no shifted windows available.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        let result = calculate_stochastic(&closes, &closes, &closes, 14).unwrap();
        assert_eq!(result.k, result.d);
    }

    #[test]
    fn mid_range_close() {
        // Window low 90, high 110, close 100 -> K = 50.
        let mut highs = vec![110.0; 14];
        let mut lows = vec![90.0; 14];
        let mut closes = vec![100.0; 14];
        highs.insert(0, 110.0);
        lows.insert(0, 90.0);
        closes.insert(0, 100.0);

        let result = calculate_stochastic(&highs, &lows, &closes, 14).unwrap();
        assert!((result.k - 50.0).abs() < 1e-10);
    }
}
