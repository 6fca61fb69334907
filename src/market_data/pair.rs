// =============================================================================
// TradingPair — rolling time-series, streaming status and health per pair
// =============================================================================
//
// Each pair owns a bounded in-memory tick history (newest appended, oldest
// evicted at MAX_HISTORY) plus derived 24h statistics.  The history is the
// sole input to indicator and pattern computation.
//
// State machine:
//   Disabled <-> Enabled,  Enabled -> Maintenance on error-threshold,
//   Maintenance -> Enabled via explicit reset.  Error is reserved for
//   unrecoverable initialisation failures.
//
// Thread-safety: configuration behind `RwLock`, mutable series + stats
// behind a single `Mutex` so append and derived-stat update are atomic.
// =============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{PairStatus, PriceData};

/// Hard cap on in-memory ticks per pair.
pub const MAX_HISTORY: usize = 1000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Static + tunable pair attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub display_name: String,
    pub enabled: bool,
    pub color: String,
    pub icon: String,
    pub update_interval_secs: u64,
    pub max_errors: u32,
    pub retry_delay_secs: u64,
    /// Optional hard validation band for tick prices.  Configured on
    /// BTC-class pairs only; ticks outside the band are rejected upstream.
    #[serde(default)]
    pub price_band: Option<(f64, f64)>,
}

impl PairConfig {
    pub fn new(display_name: &str, enabled: bool, color: &str, icon: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            enabled,
            color: color.to_string(),
            icon: icon.to_string(),
            update_interval_secs: 5,
            max_errors: 10,
            retry_delay_secs: 30,
            price_band: None,
        }
    }

    pub fn with_price_band(mut self, low: f64, high: f64) -> Self {
        self.price_band = Some((low, high));
        self
    }
}

/// Partial configuration update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairConfigUpdate {
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub update_interval_secs: Option<u64>,
    pub max_errors: Option<u32>,
    pub retry_delay_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Mutable state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PairState {
    status: PairStatus,
    is_streaming: bool,
    last_update: Option<DateTime<Utc>>,
    error_count: u32,
    last_error: Option<String>,
    history: VecDeque<PriceData>,

    total_updates: u64,
    successful_updates: u64,
    failed_updates: u64,
    first_update: Option<DateTime<Utc>>,
    avg_price_24h: f64,
    price_change_24h: f64,
}

/// Price aggregate over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// TradingPair
// ---------------------------------------------------------------------------

pub struct TradingPair {
    symbol: String,
    config: RwLock<PairConfig>,
    state: Mutex<PairState>,
}

impl TradingPair {
    pub fn new(symbol: &str, config: PairConfig) -> Self {
        let status = if config.enabled {
            PairStatus::Enabled
        } else {
            PairStatus::Disabled
        };

        Self {
            symbol: symbol.to_uppercase(),
            config: RwLock::new(config),
            state: Mutex::new(PairState {
                status,
                is_streaming: false,
                last_update: None,
                error_count: 0,
                last_error: None,
                history: VecDeque::with_capacity(MAX_HISTORY + 1),
                total_updates: 0,
                successful_updates: 0,
                failed_updates: 0,
                first_update: None,
                avg_price_24h: 0.0,
                price_change_24h: 0.0,
            }),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> PairConfig {
        self.config.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    pub fn status(&self) -> PairStatus {
        self.state.lock().status
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().is_streaming
    }

    pub fn error_count(&self) -> u32 {
        self.state.lock().error_count
    }

    pub fn update_interval_secs(&self) -> u64 {
        self.config.read().update_interval_secs
    }

    pub fn price_band(&self) -> Option<(f64, f64)> {
        self.config.read().price_band
    }

    // -------------------------------------------------------------------------
    // Tick ingestion
    // -------------------------------------------------------------------------

    /// Append a validated tick: update the bounded series, derive 24h stats,
    /// reset the error counter and stamp `last_update`.
    ///
    /// Returns false (and counts a failed update) for non-positive prices.
    pub fn add_tick(&self, tick: PriceData) -> bool {
        let mut state = self.state.lock();

        state.total_updates += 1;

        if tick.price <= 0.0 {
            state.failed_updates += 1;
            warn!(symbol = %self.symbol, price = tick.price, "rejected non-positive tick price");
            return false;
        }

        let timestamp = tick.timestamp;
        state.history.push_back(tick);
        while state.history.len() > MAX_HISTORY {
            state.history.pop_front();
        }

        if state.first_update.is_none() {
            state.first_update = Some(timestamp);
        }
        state.successful_updates += 1;
        state.last_update = Some(Utc::now());
        state.error_count = 0;

        Self::recalculate_24h_stats(&mut state);

        debug!(
            symbol = %self.symbol,
            points = state.history.len(),
            "tick appended"
        );
        true
    }

    /// Derive the trailing-24h average and price change from the in-memory
    /// window.  Best-effort: bounded history may cover less than 24h.
    fn recalculate_24h_stats(state: &mut PairState) {
        let cutoff = Utc::now() - Duration::hours(24);

        let mut sum = 0.0;
        let mut count = 0usize;
        for tick in state.history.iter().filter(|t| t.timestamp >= cutoff) {
            sum += tick.price;
            count += 1;
        }
        state.avg_price_24h = if count > 0 { sum / count as f64 } else { 0.0 };

        let current = state.history.back().map(|t| t.price);
        // Newest tick at or before the cutoff approximates the 24h-ago price.
        let old = state
            .history
            .iter()
            .rev()
            .find(|t| t.timestamp <= cutoff)
            .map(|t| t.price);

        state.price_change_24h = match (current, old) {
            (Some(now), Some(then)) if then > 0.0 => (now - then) / then * 100.0,
            _ => 0.0,
        };
    }

    /// Record an update failure against this pair.  Crossing the error
    /// threshold transitions to Maintenance and stops streaming.
    pub fn record_failure(&self, message: &str) {
        let max_errors = self.config.read().max_errors;
        let mut state = self.state.lock();

        state.error_count += 1;
        state.failed_updates += 1;
        state.total_updates += 1;
        state.last_error = Some(message.to_string());

        if state.error_count >= max_errors {
            state.status = PairStatus::Maintenance;
            state.is_streaming = false;
            warn!(
                symbol = %self.symbol,
                errors = state.error_count,
                "pair moved to maintenance after consecutive errors"
            );
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn latest(&self) -> Option<PriceData> {
        self.state.lock().history.back().cloned()
    }

    /// Most recent `limit` ticks in chronological order; all when `None`.
    pub fn history(&self, limit: Option<usize>) -> Vec<PriceData> {
        let state = self.state.lock();
        let len = state.history.len();
        let take = limit.unwrap_or(len).min(len);
        state.history.iter().skip(len - take).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Price aggregate over the trailing `hours` window.
    pub fn range(&self, hours: i64) -> RangeStats {
        let cutoff = Utc::now() - Duration::hours(hours);
        let state = self.state.lock();

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        let mut count = 0usize;

        for tick in state.history.iter().filter(|t| t.timestamp >= cutoff) {
            min = min.min(tick.price);
            max = max.max(tick.price);
            sum += tick.price;
            count += 1;
        }

        if count == 0 {
            return RangeStats {
                min: 0.0,
                max: 0.0,
                avg: 0.0,
                count: 0,
            };
        }

        RangeStats {
            min,
            max,
            avg: sum / count as f64,
            count,
        }
    }

    // -------------------------------------------------------------------------
    // Streaming control
    // -------------------------------------------------------------------------

    /// Begin streaming.  Fails for disabled pairs and pairs in maintenance.
    pub fn start_streaming(&self) -> bool {
        if !self.config.read().enabled {
            warn!(symbol = %self.symbol, "cannot stream a disabled pair");
            return false;
        }

        let mut state = self.state.lock();
        if state.status == PairStatus::Maintenance {
            warn!(symbol = %self.symbol, "cannot stream a pair in maintenance");
            return false;
        }

        state.is_streaming = true;
        state.status = PairStatus::Enabled;
        info!(symbol = %self.symbol, "streaming started");
        true
    }

    pub fn stop_streaming(&self) {
        let mut state = self.state.lock();
        if state.is_streaming {
            state.is_streaming = false;
            info!(symbol = %self.symbol, "streaming stopped");
        }
    }

    /// Healthy iff streaming, updated within 3x the update interval, and
    /// below the error threshold.
    pub fn is_streaming_healthy(&self) -> bool {
        let (interval, max_errors) = {
            let cfg = self.config.read();
            (cfg.update_interval_secs, cfg.max_errors)
        };
        let state = self.state.lock();

        if !state.is_streaming {
            return false;
        }

        if let Some(last) = state.last_update {
            let stale_after = Duration::seconds((interval * 3) as i64);
            if Utc::now() - last > stale_after {
                return false;
            }
        }

        state.error_count < max_errors
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn enable(&self) {
        self.config.write().enabled = true;
        let mut state = self.state.lock();
        state.status = PairStatus::Enabled;
        state.error_count = 0;
        info!(symbol = %self.symbol, "pair enabled");
    }

    pub fn disable(&self) {
        self.config.write().enabled = false;
        let mut state = self.state.lock();
        state.status = PairStatus::Disabled;
        state.is_streaming = false;
        info!(symbol = %self.symbol, "pair disabled");
    }

    pub fn set_maintenance(&self, reason: &str) {
        let mut state = self.state.lock();
        state.status = PairStatus::Maintenance;
        state.is_streaming = false;
        state.last_error = Some(reason.to_string());
        warn!(symbol = %self.symbol, reason, "pair moved to maintenance");
    }

    /// Clear the error counter; a pair parked in Maintenance returns to
    /// Enabled if it is still configured enabled.
    pub fn reset_errors(&self) {
        let enabled = self.config.read().enabled;
        let mut state = self.state.lock();
        state.error_count = 0;
        state.last_error = None;
        if state.status == PairStatus::Maintenance && enabled {
            state.status = PairStatus::Enabled;
        }
        info!(symbol = %self.symbol, "pair errors reset");
    }

    /// Apply a partial configuration update.
    pub fn update_config(&self, update: &PairConfigUpdate) {
        {
            let mut cfg = self.config.write();
            if let Some(name) = &update.display_name {
                cfg.display_name = name.clone();
            }
            if let Some(color) = &update.color {
                cfg.color = color.clone();
            }
            if let Some(icon) = &update.icon {
                cfg.icon = icon.clone();
            }
            if let Some(interval) = update.update_interval_secs {
                cfg.update_interval_secs = interval.max(1);
            }
            if let Some(max_errors) = update.max_errors {
                cfg.max_errors = max_errors.max(1);
            }
            if let Some(delay) = update.retry_delay_secs {
                cfg.retry_delay_secs = delay;
            }
        }

        match update.enabled {
            Some(true) => self.enable(),
            Some(false) => self.disable(),
            None => {}
        }

        debug!(symbol = %self.symbol, "pair config updated");
    }

    // -------------------------------------------------------------------------
    // Status payloads
    // -------------------------------------------------------------------------

    /// Full status snapshot for the external surface.
    pub fn status_payload(&self) -> serde_json::Value {
        let cfg = self.config.read().clone();
        let state = self.state.lock();

        let success_rate = if state.total_updates > 0 {
            state.successful_updates as f64 / state.total_updates as f64 * 100.0
        } else {
            0.0
        };

        serde_json::json!({
            "symbol": self.symbol,
            "display_name": cfg.display_name,
            "enabled": cfg.enabled,
            "status": state.status.to_string(),
            "is_streaming": state.is_streaming,
            "color": cfg.color,
            "icon": cfg.icon,
            "current_price": state.history.back().map(|t| t.price).unwrap_or(0.0),
            "last_update": state.last_update.map(|t| t.to_rfc3339()),
            "data_points": state.history.len(),
            "error_count": state.error_count,
            "last_error": state.last_error,
            "total_updates": state.total_updates,
            "successful_updates": state.successful_updates,
            "failed_updates": state.failed_updates,
            "success_rate": success_rate,
            "avg_price_24h": state.avg_price_24h,
            "price_change_24h": state.price_change_24h,
            "update_interval_secs": cfg.update_interval_secs,
            "max_errors": cfg.max_errors,
            "retry_delay_secs": cfg.retry_delay_secs,
        })
    }
}
