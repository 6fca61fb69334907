// =============================================================================
// Signal Manager — creation, activation, resolution, expiry, persistence
// =============================================================================
//
// Owns the live signal table (capped at `max_active`), the uniqueness set
// and the pattern cooldowns, all behind one lock so lifecycle transitions
// are totally ordered per signal.
//
// Creation pipeline, in order: confidence floor, active cap, pattern
// cooldown, parameter validation, market-condition validation, hash
// uniqueness, entry-overlap check.  Every rejection is expected flow
// control and logs at debug.
//
// A store-level duplicate on insert is downgraded to a debug event: the row
// already exists from an earlier run, so the hash is registered and the
// candidate dropped.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::indicators::IndicatorSnapshot;
use crate::runtime_config::RuntimeConfig;
use crate::signals::model::{signal_hash, PatternCandidate, PatternType, Signal, SignalStatus};
use crate::signals::validator::{
    validate_market_conditions, validate_parameters, CooldownTracker, UniquenessSet,
};
use crate::storage::{is_duplicate_signal, Database};

/// Activation tolerance on the entry-crossing side.
const ACTIVATION_TOLERANCE: f64 = 0.001;
/// Active signals with entries within this fraction and the same bias overlap.
const OVERLAP_FRACTION: f64 = 0.01;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables for the signal manager, derived from the runtime configuration.
#[derive(Debug, Clone)]
pub struct SignalSettings {
    pub max_active: usize,
    /// Candidate confidence floor in 0..1.
    pub min_confidence: f64,
    pub expiry_unactivated: Duration,
    pub expiry_activated: Duration,
    pub retention_days: u32,
    pub default_stop_loss_pct: f64,
    pub default_take_profit_pct: f64,
}

impl SignalSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let expiry_hours = config.trading.signal_expiry_hours;
        Self {
            max_active: config.trading.max_concurrent_signals,
            min_confidence: config.trading.min_confidence_threshold,
            expiry_unactivated: Duration::hours(expiry_hours),
            // Activated signals get double the unactivated window.
            expiry_activated: Duration::hours(expiry_hours * 2),
            retention_days: config.database.cleanup_days,
            default_stop_loss_pct: config.trading.default_stop_loss_pct,
            default_take_profit_pct: config.trading.default_take_profit_pct,
        }
    }
}

// ---------------------------------------------------------------------------
// SignalManager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ManagerInner {
    active: HashMap<String, Signal>,
    uniqueness: UniquenessSet,
    cooldowns: CooldownTracker,
}

pub struct SignalManager {
    db: Database,
    settings: SignalSettings,
    inner: Mutex<ManagerInner>,
}

impl SignalManager {
    pub fn new(db: Database, settings: SignalSettings) -> Self {
        Self {
            db,
            settings,
            inner: Mutex::new(ManagerInner::default()),
        }
    }

    /// Reload ACTIVE signals from the store and re-register their hashes.
    /// Cooldowns are soft in-memory hints and are not restored.
    pub fn recover(&self) -> anyhow::Result<usize> {
        let recovered = self.db.get_active_signals()?;
        let count = recovered.len();

        let mut inner = self.inner.lock();
        for signal in recovered {
            inner.uniqueness.insert(signal.signal_id.clone());
            inner.active.insert(signal.signal_id.clone(), signal);
        }

        if count > 0 {
            info!(count, "active signals recovered from store");
        }
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Run a detector candidate through the full creation pipeline.
    /// Returns the created signal, or `None` on any rejection.
    pub fn create_from_candidate(
        &self,
        symbol: &str,
        candidate: &PatternCandidate,
        current_price: f64,
        indicators: &IndicatorSnapshot,
    ) -> Option<Signal> {
        let now = Utc::now();

        if candidate.confidence / 100.0 < self.settings.min_confidence {
            debug!(
                symbol,
                pattern = %candidate.pattern,
                confidence = candidate.confidence,
                "candidate below confidence floor"
            );
            return None;
        }

        let mut inner = self.inner.lock();

        if inner.active.len() >= self.settings.max_active {
            debug!(
                symbol,
                pattern = %candidate.pattern,
                active = inner.active.len(),
                "active signal cap reached"
            );
            return None;
        }

        if let Err(reason) = inner.cooldowns.check(candidate.pattern, now) {
            debug!(symbol, reason, "candidate rejected");
            return None;
        }

        if let Err(reason) = validate_parameters(candidate, current_price) {
            debug!(symbol, pattern = %candidate.pattern, reason, "candidate rejected");
            return None;
        }

        if let Err(reason) = validate_market_conditions(indicators) {
            debug!(symbol, pattern = %candidate.pattern, reason, "candidate rejected");
            return None;
        }

        let hash = signal_hash(
            candidate.pattern.as_str(),
            candidate.entry,
            candidate.target,
            candidate.stop,
            current_price,
        );
        if inner.uniqueness.contains(&hash) {
            debug!(symbol, hash = %hash, "candidate rejected: duplicate signal hash");
            return None;
        }

        let overlapping = inner.active.values().any(|s| {
            s.is_bullish() == candidate.pattern.is_bullish()
                && (candidate.entry - s.entry_price).abs() / candidate.entry < OVERLAP_FRACTION
        });
        if overlapping {
            debug!(
                symbol,
                entry = candidate.entry,
                "candidate rejected: overlaps an active signal"
            );
            return None;
        }

        let signal = Signal::from_candidate(symbol, candidate, current_price);

        match self.db.save_signal(&signal) {
            Ok(()) => {}
            Err(e) if is_duplicate_signal(&e) => {
                debug!(symbol, hash = %hash, "store already holds this signal id");
                inner.uniqueness.insert(hash);
                return None;
            }
            Err(e) => {
                error!(symbol, error = %e, "failed to persist new signal");
                return None;
            }
        }

        inner.active.insert(hash.clone(), signal.clone());
        inner.uniqueness.insert(hash);
        inner.cooldowns.mark(candidate.pattern, now);

        info!(
            symbol,
            pattern = %candidate.pattern,
            signal_id = %signal.signal_id,
            entry = signal.entry_price,
            target = signal.target_price,
            stop = signal.stop_loss,
            confidence = signal.confidence,
            "signal created"
        );

        Some(signal)
    }

    /// Create a signal from operator input.  Missing target/stop distances
    /// fall back to the configured defaults.
    pub fn create_manual(
        &self,
        symbol: &str,
        signal_type: &str,
        entry: f64,
        target: Option<f64>,
        stop: Option<f64>,
        current_price: f64,
        indicators: &IndicatorSnapshot,
    ) -> Option<Signal> {
        let pattern = match signal_type.to_uppercase().as_str() {
            "BUY" => PatternType::ManualBuy,
            "SELL" => PatternType::ManualSell,
            other => {
                debug!(symbol, signal_type = other, "unknown manual signal type");
                return None;
            }
        };

        let tp = self.settings.default_take_profit_pct / 100.0;
        let sl = self.settings.default_stop_loss_pct / 100.0;

        let (target, stop) = if pattern.is_bullish() {
            (
                target.unwrap_or(entry * (1.0 + tp)),
                stop.unwrap_or(entry * (1.0 - sl)),
            )
        } else {
            (
                target.unwrap_or(entry * (1.0 - tp)),
                stop.unwrap_or(entry * (1.0 + sl)),
            )
        };

        let candidate = PatternCandidate {
            pattern,
            entry,
            target,
            stop,
            confidence: 100.0,
        };

        self.create_from_candidate(symbol, &candidate, current_price, indicators)
    }

    // -------------------------------------------------------------------------
    // Lifecycle updates
    // -------------------------------------------------------------------------

    /// Drive every active signal on `symbol` with the freshest price:
    /// activation latch, target/stop resolution, and age-based expiry.
    pub fn update_on_tick(&self, symbol: &str, price: f64) {
        let now = Utc::now();
        let mut to_persist: Vec<Signal> = Vec::new();

        {
            let mut inner = self.inner.lock();
            let mut terminal: Vec<String> = Vec::new();

            for signal in inner.active.values_mut().filter(|s| s.symbol == symbol) {
                let mut changed = false;
                signal.current_price = price;

                if !signal.activated && crosses_entry(signal, price) {
                    signal.activated = true;
                    signal.updated_at = now;
                    changed = true;
                    info!(
                        signal_id = %signal.signal_id,
                        symbol,
                        price,
                        entry = signal.entry_price,
                        "signal activated"
                    );
                }

                if signal.status == SignalStatus::Active && signal.activated {
                    if signal.is_bullish() {
                        if price >= signal.target_price {
                            resolve(signal, SignalStatus::HitTarget, now);
                            changed = true;
                        } else if price <= signal.stop_loss {
                            resolve(signal, SignalStatus::HitStop, now);
                            changed = true;
                        }
                    } else if price <= signal.target_price {
                        resolve(signal, SignalStatus::HitTarget, now);
                        changed = true;
                    } else if price >= signal.stop_loss {
                        resolve(signal, SignalStatus::HitStop, now);
                        changed = true;
                    }
                }

                if signal.status == SignalStatus::Active && self.is_expired(signal, now) {
                    expire(signal, now);
                    changed = true;
                }

                if changed {
                    to_persist.push(signal.clone());
                }
                if signal.status.is_terminal() {
                    terminal.push(signal.signal_id.clone());
                }
            }

            for id in terminal {
                inner.active.remove(&id);
            }
        }

        for signal in to_persist {
            if let Err(e) = self.db.update_signal(&signal) {
                error!(signal_id = %signal.signal_id, error = %e, "failed to persist signal update");
            }
        }
    }

    /// Expire overdue signals regardless of tick flow (pairs can go quiet).
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        let mut to_persist: Vec<Signal> = Vec::new();

        {
            let mut inner = self.inner.lock();
            let mut terminal: Vec<String> = Vec::new();

            for signal in inner.active.values_mut() {
                if self.is_expired(signal, now) {
                    expire(signal, now);
                    to_persist.push(signal.clone());
                    terminal.push(signal.signal_id.clone());
                }
            }
            for id in terminal {
                inner.active.remove(&id);
            }
        }

        for signal in to_persist {
            if let Err(e) = self.db.update_signal(&signal) {
                error!(signal_id = %signal.signal_id, error = %e, "failed to persist expiry");
            }
        }
    }

    fn is_expired(&self, signal: &Signal, now: DateTime<Utc>) -> bool {
        let limit = if signal.activated {
            self.settings.expiry_activated
        } else {
            self.settings.expiry_unactivated
        };
        now - signal.created_at >= limit
    }

    /// Manually terminate an active signal.
    pub fn close_signal(&self, signal_id: &str, reason: &str) -> bool {
        let now = Utc::now();

        let closed = {
            let mut inner = self.inner.lock();
            let Some(mut signal) = inner.active.remove(signal_id) else {
                debug!(signal_id, "cannot close unknown or inactive signal");
                return false;
            };

            signal.status = SignalStatus::Expired;
            signal.closed_at = Some(now);
            signal.updated_at = now;
            signal.close_reason = Some(reason.to_string());
            signal.profit_loss_pct = Some(if signal.activated {
                directional_pl(&signal, signal.current_price)
            } else {
                0.0
            });
            signal
        };

        if let Err(e) = self.db.update_signal(&closed) {
            error!(signal_id, error = %e, "failed to persist manual close");
        }

        info!(signal_id, reason, "signal closed manually");
        true
    }

    // -------------------------------------------------------------------------
    // Housekeeping and queries
    // -------------------------------------------------------------------------

    /// Remove terminal rows older than the retention window.
    pub fn cleanup(&self) -> anyhow::Result<usize> {
        self.db.cleanup_closed_signals(self.settings.retention_days)
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Snapshot of the live signal table, newest first.
    pub fn active_snapshot(&self) -> Vec<Signal> {
        let inner = self.inner.lock();
        let mut signals: Vec<Signal> = inner.active.values().cloned().collect();
        signals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        signals
    }

    pub fn get_signal(&self, signal_id: &str) -> Option<Signal> {
        self.inner.lock().active.get(signal_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Transition helpers
// ---------------------------------------------------------------------------

/// Bullish: price reached down to entry (with tolerance).  Bearish: price
/// reached up to entry.
fn crosses_entry(signal: &Signal, price: f64) -> bool {
    if signal.is_bullish() {
        price >= signal.entry_price * (1.0 - ACTIVATION_TOLERANCE)
    } else {
        price <= signal.entry_price * (1.0 + ACTIVATION_TOLERANCE)
    }
}

/// Profit/loss in percent for an exit at `exit_price`.
fn directional_pl(signal: &Signal, exit_price: f64) -> f64 {
    if signal.is_bullish() {
        (exit_price - signal.entry_price) / signal.entry_price * 100.0
    } else {
        (signal.entry_price - exit_price) / signal.entry_price * 100.0
    }
}

fn resolve(signal: &mut Signal, status: SignalStatus, now: DateTime<Utc>) {
    let (exit_price, reason) = match status {
        SignalStatus::HitTarget => (signal.target_price, "target reached"),
        SignalStatus::HitStop => (signal.stop_loss, "stop loss hit"),
        _ => unreachable!("resolve is only called with terminal price statuses"),
    };

    signal.status = status;
    signal.closed_at = Some(now);
    signal.updated_at = now;
    signal.close_reason = Some(reason.to_string());
    signal.profit_loss_pct = Some(directional_pl(signal, exit_price));

    info!(
        signal_id = %signal.signal_id,
        symbol = %signal.symbol,
        status = %signal.status,
        profit_loss_pct = signal.profit_loss_pct,
        "signal resolved"
    );
}

fn expire(signal: &mut Signal, now: DateTime<Utc>) {
    signal.status = SignalStatus::Expired;
    signal.closed_at = Some(now);
    signal.updated_at = now;
    signal.close_reason = Some("expired".to_string());
    signal.profit_loss_pct = Some(0.0);

    info!(
        signal_id = %signal.signal_id,
        symbol = %signal.symbol,
        activated = signal.activated,
        "signal expired"
    );
}
