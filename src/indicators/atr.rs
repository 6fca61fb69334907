// =============================================================================
// Average True Range (ATR)
// =============================================================================
//
// ATR measures volatility by decomposing the entire range of a bar:
//   TR = max(high - low, |high - prevClose|, |low - prevClose|)
// and averaging the last `period` true ranges.
// =============================================================================

/// Compute the ATR as the arithmetic mean of the last `period` true ranges.
///
/// # Returns
/// `None` when:
/// - `period` is zero.
/// - Fewer than `period + 1` samples (each TR needs a previous close).
/// - The result is non-finite.
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let len = closes.len();
    if period == 0 || len < period + 1 || highs.len() != len || lows.len() != len {
        return None;
    }

    let mut sum_tr = 0.0;
    for i in (len - period)..len {
        let prev_close = closes[i - 1];
        let tr = (highs[i] - lows[i])
            .max((highs[i] - prev_close).abs())
            .max((lows[i] - prev_close).abs());
        sum_tr += tr;
    }

    let atr = sum_tr / period as f64;
    atr.is_finite().then_some(atr)
}
