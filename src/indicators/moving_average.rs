// =============================================================================
// Moving Averages — SMA and EMA
// =============================================================================
//
// SMA: arithmetic mean of the last `period` values.
//
// EMA: seeded with the SMA of the FIRST `period` values, then smoothed
// forward over the remainder of the series:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
// =============================================================================

/// Arithmetic mean of the last `period` values.
///
/// Returns `None` when `period` is zero or the series is shorter than
/// `period`.
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let sum: f64 = window.iter().sum();
    let sma = sum / period as f64;

    sma.is_finite().then_some(sma)
}

/// Exponential moving average over the whole series, seeded with the SMA of
/// the first `period` values.
///
/// Returns `None` when `period` is zero or the series is shorter than
/// `period`.
pub fn calculate_ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed with the SMA of the first `period` values.
    let mut ema: f64 = values[..period].iter().sum::<f64>() / period as f64;

    for &value in &values[period..] {
        ema = value * multiplier + ema * (1.0 - multiplier);
    }

    ema.is_finite().then_some(ema)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(calculate_sma(&values, 5), Some(3.0));
        // Last 3 only.
        assert_eq!(calculate_sma(&values, 3), Some(4.0));
    }

    #[test]
    fn sma_insufficient_history() {
        assert_eq!(calculate_sma(&[1.0, 2.0], 3), None);
        assert_eq!(calculate_sma(&[], 1), None);
        assert_eq!(calculate_sma(&[1.0], 0), None);
    }

    #[test]
    fn sma_exact_length_boundary() {
        // Exactly `period` samples is the minimum that produces a value.
        let values = vec![10.0; 20];
        assert_eq!(calculate_sma(&values[..19], 20), None);
        assert_eq!(calculate_sma(&values, 20), Some(10.0));
    }

    #[test]
    fn ema_equals_sma_with_exact_period() {
        // With no samples beyond the seed window the EMA is just the seed SMA.
        let values = vec![2.0, 4.0, 6.0];
        assert_eq!(calculate_ema(&values, 3), Some(4.0));
    }

    #[test]
    fn ema_weights_recent_values() {
        let mut values = vec![100.0; 12];
        values.push(200.0);
        let ema = calculate_ema(&values, 12).unwrap();
        // One jump up pulls the EMA above the flat seed but well below 200.
        assert!(ema > 100.0 && ema < 200.0);

        // alpha = 2/13: 200*a + 100*(1-a).
        let alpha = 2.0 / 13.0;
        let expected = 200.0 * alpha + 100.0 * (1.0 - alpha);
        assert!((ema - expected).abs() < 1e-9);
    }

    #[test]
    fn ema_insufficient_history() {
        assert_eq!(calculate_ema(&[1.0; 11], 12), None);
        assert_eq!(calculate_ema(&[], 12), None);
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let values = vec![50.0; 40];
        assert_eq!(calculate_ema(&values, 12), Some(50.0));
    }
}
