// =============================================================================
// Signal Validation — parameters, market conditions, uniqueness, cooldowns
// =============================================================================
//
// Rejection is flow control, not an error: every check returns
// `Result<(), String>` where the `Err` carries a descriptive reason that the
// manager logs at debug level.
// =============================================================================

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::indicators::IndicatorSnapshot;
use crate::signals::model::{risk_reward, PatternCandidate, PatternType};

/// Maximum relative distance between entry and the current market price.
const MAX_ENTRY_DISTANCE: f64 = 0.02;
/// Minimum risk/reward ratio at creation.
const MIN_RISK_REWARD: f64 = 1.5;
/// Maximum risk (entry to stop) as a fraction of entry.
const MAX_RISK_FRACTION: f64 = 0.05;
/// Band width above which the market is considered too volatile to trade.
const MAX_BAND_WIDTH: f64 = 0.10;

/// Uniqueness set capacity; on overflow the most recent entries are kept.
const UNIQUENESS_CAP: usize = 1000;
/// Entries retained after a compaction.
const UNIQUENESS_RETAIN: usize = 800;

// ---------------------------------------------------------------------------
// Parameter validation
// ---------------------------------------------------------------------------

/// Validate a candidate's contract prices against the current market price.
pub fn validate_parameters(candidate: &PatternCandidate, current_price: f64) -> Result<(), String> {
    let PatternCandidate {
        pattern,
        entry,
        target,
        stop,
        ..
    } = *candidate;

    if entry <= 0.0 || target <= 0.0 || stop <= 0.0 || current_price <= 0.0 {
        return Err("non-positive price in signal parameters".to_string());
    }

    let entry_distance = (entry - current_price).abs() / current_price;
    if entry_distance > MAX_ENTRY_DISTANCE {
        return Err(format!(
            "entry {:.2} is {:.2}% away from market price {:.2}",
            entry,
            entry_distance * 100.0,
            current_price
        ));
    }

    let direction_ok = if pattern.is_bullish() {
        target > entry && entry > stop
    } else {
        stop > entry && entry > target
    };
    if !direction_ok {
        return Err(format!(
            "inconsistent direction for {}: entry {:.2}, target {:.2}, stop {:.2}",
            pattern, entry, target, stop
        ));
    }

    let rr = risk_reward(entry, target, stop);
    if rr < MIN_RISK_REWARD {
        return Err(format!("risk/reward {rr:.2} below minimum {MIN_RISK_REWARD}"));
    }

    let risk_fraction = (entry - stop).abs() / entry;
    if risk_fraction > MAX_RISK_FRACTION {
        return Err(format!(
            "risk {:.2}% of entry exceeds {:.0}% cap",
            risk_fraction * 100.0,
            MAX_RISK_FRACTION * 100.0
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Market-condition validation
// ---------------------------------------------------------------------------

/// Require core indicator coverage and reject excessively volatile markets.
pub fn validate_market_conditions(indicators: &IndicatorSnapshot) -> Result<(), String> {
    if indicators.rsi.is_none() || indicators.sma_12.is_none() || indicators.sma_30.is_none() {
        return Err("insufficient indicator coverage (RSI, SMA_12, SMA_30 required)".to_string());
    }

    if let (Some(upper), Some(lower)) = (indicators.bb_upper, indicators.bb_lower) {
        if lower > 0.0 {
            let band_width = (upper - lower) / lower;
            if band_width > MAX_BAND_WIDTH {
                return Err(format!(
                    "market too volatile: band width {:.1}%",
                    band_width * 100.0
                ));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Uniqueness set
// ---------------------------------------------------------------------------

/// Bounded set of known signal hashes.  Insertion order is tracked so a full
/// set compacts down to the most recent entries.
#[derive(Debug, Default)]
pub struct UniquenessSet {
    known: HashSet<String>,
    order: VecDeque<String>,
}

impl UniquenessSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.known.contains(hash)
    }

    /// Register a hash.  When the set is full it is compacted so that after
    /// the insert exactly UNIQUENESS_RETAIN most-recent entries remain.
    pub fn insert(&mut self, hash: String) {
        if self.known.contains(&hash) {
            return;
        }

        if self.order.len() >= UNIQUENESS_CAP {
            while self.order.len() > UNIQUENESS_RETAIN - 1 {
                if let Some(old) = self.order.pop_front() {
                    self.known.remove(&old);
                }
            }
        }

        self.known.insert(hash.clone());
        self.order.push_back(hash);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Cooldown tracker
// ---------------------------------------------------------------------------

/// Per-pattern last-emitted timestamps.  Soft in-memory hints: not restored
/// across restarts.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_emitted: HashMap<PatternType, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining cooldown check at `now`; `Err` carries the reason.
    pub fn check(&self, pattern: PatternType, now: DateTime<Utc>) -> Result<(), String> {
        if let Some(&last) = self.last_emitted.get(&pattern) {
            let window = pattern.cooldown();
            let elapsed = now - last;
            if elapsed < window {
                let remaining = window - elapsed;
                return Err(format!(
                    "{} in cooldown for {}m more",
                    pattern,
                    remaining.num_minutes().max(1)
                ));
            }
        }
        Ok(())
    }

    pub fn mark(&mut self, pattern: PatternType, at: DateTime<Utc>) {
        self.last_emitted.insert(pattern, at);
    }
}
