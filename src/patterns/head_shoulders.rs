// =============================================================================
// Head and Shoulders — three ordered peaks with a dominant head
// =============================================================================
//
// Detection:
//   1. Local maxima over a ±LOCAL_WINDOW sample window, kept only when the
//      peak's volume is at least 0.6x its trailing-30 average.
//   2. The three most recent peaks, in index order, form left shoulder,
//      head and right shoulder.
//   3. Accept when peaks are separated by at least MIN_SEPARATION samples,
//      the head clears each shoulder by 3-15%, and the shoulders sit within
//      2.5% of each other.
//
// The neckline is the lower of the two shoulders; a confirmed pattern is
// traded short below it.
// =============================================================================

use crate::patterns::{is_local_max, trailing_avg};
use crate::signals::model::{PatternCandidate, PatternType};

/// Minimum series length before detection is attempted.
const MIN_TICKS: usize = 100;
/// Half-width of the local-maximum sliding window.
const LOCAL_WINDOW: usize = 25;
/// Minimum samples between consecutive peaks.
const MIN_SEPARATION: usize = 15;
/// Head must exceed each shoulder by at least this ratio...
const MIN_HEAD_RATIO: f64 = 1.03;
/// ...and by no more than this ratio.
const MAX_HEAD_RATIO: f64 = 1.15;
/// Maximum relative gap between the two shoulders.
const MAX_SHOULDER_GAP: f64 = 0.025;
/// Volume must reach this fraction of its trailing-30 average.
const VOLUME_FACTOR: f64 = 0.6;

/// Detect a head-and-shoulders top over parallel high/volume arrays (oldest
/// first).  Returns at most one candidate.
pub fn detect_head_and_shoulders(highs: &[f64], volumes: &[f64]) -> Option<PatternCandidate> {
    if highs.len() < MIN_TICKS || volumes.len() != highs.len() {
        return None;
    }

    // Volume-confirmed local maxima: (index, high).
    let maxima: Vec<(usize, f64)> = (0..highs.len())
        .filter(|&i| is_local_max(highs, i, LOCAL_WINDOW))
        .filter(|&i| volumes[i] >= VOLUME_FACTOR * trailing_avg(volumes, i, 30))
        .map(|i| (i, highs[i]))
        .collect();

    if maxima.len() < 3 {
        return None;
    }

    let (ls_idx, left_shoulder) = maxima[maxima.len() - 3];
    let (head_idx, head) = maxima[maxima.len() - 2];
    let (rs_idx, right_shoulder) = maxima[maxima.len() - 1];

    if head_idx - ls_idx < MIN_SEPARATION || rs_idx - head_idx < MIN_SEPARATION {
        return None;
    }

    let left_ratio = head / left_shoulder;
    let right_ratio = head / right_shoulder;
    if !(MIN_HEAD_RATIO..=MAX_HEAD_RATIO).contains(&left_ratio)
        || !(MIN_HEAD_RATIO..=MAX_HEAD_RATIO).contains(&right_ratio)
    {
        return None;
    }

    let shoulder_gap =
        (left_shoulder - right_shoulder).abs() / left_shoulder.min(right_shoulder);
    if shoulder_gap > MAX_SHOULDER_GAP {
        return None;
    }

    let neckline = left_shoulder.min(right_shoulder);
    let head_height = head - neckline;

    Some(PatternCandidate {
        pattern: PatternType::HeadAndShoulders,
        entry: neckline * 0.998,
        target: neckline - 0.8 * head_height,
        stop: head * 1.015,
        confidence: 80.0,
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// 125-sample series with triangular peaks at indices 25 (105),
    /// 60 (110) and 95 (104.8) on a 100 baseline.  Peaks sit more than the
    /// ±25 window apart so each is a strict local maximum.
    fn synthetic_head_and_shoulders() -> (Vec<f64>, Vec<f64>) {
        let mut highs = vec![100.0; 125];
        for i in 0..125usize {
            let ls = 105.0 - i.abs_diff(25) as f64;
            let head = 110.0 - i.abs_diff(60) as f64;
            let rs = 104.8 - i.abs_diff(95) as f64;
            highs[i] = ls.max(head).max(rs).max(100.0);
        }
        let volumes = vec![1_000.0; 125];
        (highs, volumes)
    }

    #[test]
    fn detects_textbook_pattern() {
        let (highs, volumes) = synthetic_head_and_shoulders();
        let candidate = detect_head_and_shoulders(&highs, &volumes).expect("pattern");

        assert_eq!(candidate.pattern, PatternType::HeadAndShoulders);
        assert_eq!(candidate.confidence, 80.0);

        // Neckline at the lower (right) shoulder.
        let neckline = 104.8;
        assert!((candidate.entry - neckline * 0.998).abs() < 1e-9);
        assert!((candidate.target - (neckline - 0.8 * (110.0 - neckline))).abs() < 1e-9);
        assert!((candidate.stop - 110.0 * 1.015).abs() < 1e-9);

        // Bearish geometry: stop above entry above target.
        assert!(candidate.stop > candidate.entry);
        assert!(candidate.entry > candidate.target);
    }

    #[test]
    fn too_short_series_yields_nothing() {
        let (highs, volumes) = synthetic_head_and_shoulders();
        assert!(detect_head_and_shoulders(&highs[..99], &volumes[..99]).is_none());
    }

    #[test]
    fn flat_head_rejected() {
        // Head barely above the shoulders misses the 3% minimum ratio.
        let mut highs = vec![100.0; 125];
        for i in 0..125usize {
            let ls = 105.0 - i.abs_diff(25) as f64;
            let head = 106.0 - i.abs_diff(60) as f64;
            let rs = 104.9 - i.abs_diff(95) as f64;
            highs[i] = ls.max(head).max(rs).max(100.0);
        }
        let volumes = vec![1_000.0; 125];
        assert!(detect_head_and_shoulders(&highs, &volumes).is_none());
    }

    #[test]
    fn lopsided_shoulders_rejected() {
        // Shoulders 5% apart break the 2.5% symmetry bound while both
        // head ratios stay inside [1.03, 1.15].
        let mut highs = vec![100.0; 125];
        for i in 0..125usize {
            let ls = 106.0 - i.abs_diff(25) as f64;
            let head = 110.5 - i.abs_diff(60) as f64;
            let rs = 100.9 - i.abs_diff(95) as f64;
            highs[i] = ls.max(head).max(rs).max(100.0);
        }
        let volumes = vec![1_000.0; 125];
        assert!(detect_head_and_shoulders(&highs, &volumes).is_none());
    }

    #[test]
    fn low_volume_peaks_ignored() {
        let (highs, mut volumes) = synthetic_head_and_shoulders();
        volumes[60] = 1.0;
        assert!(detect_head_and_shoulders(&highs, &volumes).is_none());
    }
}
