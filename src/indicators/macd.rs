// =============================================================================
// MACD — Moving Average Convergence Divergence
// =============================================================================
//
//   MACD      = EMA_12 - EMA_26
//   signal    = 0.9 * MACD
//   histogram = MACD - signal
//
// The signal line is a documented simplification: it scales the MACD value
// rather than smoothing it with a 9-period EMA.  Kept as-is for behavioral
// parity with the established signal history.
// =============================================================================

use crate::indicators::moving_average::calculate_ema;

/// Scaling factor standing in for the conventional 9-period signal EMA.
const SIGNAL_FACTOR: f64 = 0.9;

/// Result of a MACD calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute MACD, signal and histogram over `closes`.
///
/// Returns `None` when the series is shorter than the slow EMA period (26).
pub fn calculate_macd(closes: &[f64]) -> Option<MacdResult> {
    let ema_12 = calculate_ema(closes, 12)?;
    let ema_26 = calculate_ema(closes, 26)?;

    let macd = ema_12 - ema_26;
    let signal = SIGNAL_FACTOR * macd;
    let histogram = macd - signal;

    Some(MacdResult {
        macd,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient_data() {
        let closes = vec![100.0; 25];
        assert_eq!(calculate_macd(&closes), None);
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let closes = vec![100.0; 40];
        let result = calculate_macd(&closes).unwrap();
        assert!(result.macd.abs() < 1e-10);
        assert!(result.signal.abs() < 1e-10);
        assert!(result.histogram.abs() < 1e-10);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let result = calculate_macd(&closes).unwrap();
        // Fast EMA tracks the rise more closely than the slow EMA.
        assert!(result.macd > 0.0);
        assert!((result.signal - 0.9 * result.macd).abs() < 1e-12);
        assert!((result.histogram - 0.1 * result.macd).abs() < 1e-12);
    }

    #[test]
    fn macd_negative_in_downtrend() {
        let closes: Vec<f64> = (1..=60).rev().map(|x| x as f64).collect();
        let result = calculate_macd(&closes).unwrap();
        assert!(result.macd < 0.0);
        assert!(result.histogram < 0.0);
    }
}
