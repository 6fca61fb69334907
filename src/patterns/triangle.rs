// =============================================================================
// Triangle Breakout — converging range resolved at support or resistance
// =============================================================================
//
// Convergence: the average bar range of the last RANGE_WINDOW samples must
// shrink below 0.7x the average range of the RANGE_WINDOW samples before
// them.  Resistance and support come from the most recent LEVEL_WINDOW
// highs/lows; a close within 0.2% of either level is traded as a breakout
// in that direction.
// =============================================================================

use crate::signals::model::{PatternCandidate, PatternType};

/// Minimum series length before detection is attempted.
const MIN_TICKS: usize = 40;
/// Samples per range-comparison window.
const RANGE_WINDOW: usize = 15;
/// Samples used to find support and resistance.
const LEVEL_WINDOW: usize = 10;
/// Late range must shrink below this fraction of the early range.
const CONVERGENCE_FACTOR: f64 = 0.7;
/// Maximum relative distance of the close from a level to call a breakout.
const BREAKOUT_PROXIMITY: f64 = 0.002;

fn avg_range(highs: &[f64], lows: &[f64]) -> f64 {
    let sum: f64 = highs.iter().zip(lows).map(|(h, l)| h - l).sum();
    sum / highs.len() as f64
}

/// Detect a triangle breakout over parallel high/low/close arrays (oldest
/// first).  Returns at most one candidate, up or down.
pub fn detect_triangle_breakout(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
) -> Option<PatternCandidate> {
    let len = closes.len();
    if len < MIN_TICKS || highs.len() != len || lows.len() != len {
        return None;
    }

    let late_start = len - RANGE_WINDOW;
    let early_start = len - 2 * RANGE_WINDOW;

    let late_range = avg_range(&highs[late_start..], &lows[late_start..]);
    let early_range = avg_range(&highs[early_start..late_start], &lows[early_start..late_start]);

    if early_range <= 0.0 || late_range >= CONVERGENCE_FACTOR * early_range {
        return None;
    }

    let level_start = len - LEVEL_WINDOW;
    let resistance = highs[level_start..].iter().fold(f64::MIN, |a, &b| a.max(b));
    let support = lows[level_start..].iter().fold(f64::MAX, |a, &b| a.min(b));
    let last_close = closes[len - 1];

    if resistance <= 0.0 || support <= 0.0 || resistance <= support {
        return None;
    }

    let span = resistance - support;

    if (resistance - last_close).abs() / resistance <= BREAKOUT_PROXIMITY {
        let entry = resistance * 1.002;
        return Some(PatternCandidate {
            pattern: PatternType::TriangleBreakoutUp,
            entry,
            target: resistance + span,
            stop: support * 0.99,
            confidence: 70.0,
        });
    }

    if (last_close - support).abs() / support <= BREAKOUT_PROXIMITY {
        let entry = support * 0.998;
        return Some(PatternCandidate {
            pattern: PatternType::TriangleBreakoutDown,
            entry,
            target: support - span,
            stop: resistance * 1.01,
            confidence: 70.0,
        });
    }

    None
}
