// =============================================================================
// Trading System — root facade owning every subsystem
// =============================================================================
//
// The single entry point for external collaborators.  Owns the store, the
// pair registry, the streamer and the signal manager as explicitly
// constructed values; lifecycle is init -> start -> stop.
//
// Accepted ticks flow through two sinks: the storage sink persists them, the
// analysis sink recomputes indicators, drives signal lifecycle updates and
// feeds detector candidates to the signal manager.  Both defer their work to
// blocking tasks so the fetch path never waits on the store.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::indicators::{compute_all, IndicatorSnapshot};
use crate::market_data::{PairConfigUpdate, PairManager, TradingPair};
use crate::patterns::detect_all;
use crate::runtime_config::RuntimeConfig;
use crate::signals::{SignalManager, SignalSettings, SignalStatus};
use crate::sources::{AggregatorSource, ExchangeTickerSource, QuoteSource, SimulatedSource};
use crate::storage::Database;
use crate::streamer::{MultiPairStreamer, TickSink};
use crate::types::{ApiResponse, PriceData};

/// Interval between housekeeping sweeps (expiry without ticks).
const MAINTENANCE_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Persists every accepted tick.
struct StorageSink {
    db: Database,
}

impl TickSink for StorageSink {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn on_tick(&self, _pair: &Arc<TradingPair>, tick: &PriceData) {
        let db = self.db.clone();
        let tick = tick.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = db.save_price_data(&tick) {
                error!(symbol = %tick.symbol, error = %e, "failed to persist tick");
            }
        });
    }
}

/// Recomputes indicators, updates live signals and feeds detector
/// candidates to the signal manager.
struct AnalysisSink {
    db: Database,
    signals: Arc<SignalManager>,
}

impl TickSink for AnalysisSink {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn on_tick(&self, pair: &Arc<TradingPair>, tick: &PriceData) {
        let pair = Arc::clone(pair);
        let price = tick.price;
        let db = self.db.clone();
        let signals = Arc::clone(&self.signals);

        tokio::task::spawn_blocking(move || {
            let symbol = pair.symbol().to_string();
            let history = pair.history(None);
            if history.is_empty() {
                return;
            }

            let snapshot = snapshot_from_history(&history);
            for (name, value) in snapshot.values() {
                if let Some(value) = value {
                    if let Err(e) = db.save_indicator(&symbol, name, value, "5m", None) {
                        error!(symbol = %symbol, indicator = name, error = %e, "failed to persist indicator");
                    }
                }
            }

            // Latest committed price drives the live signal table first, so
            // a freed slot is available to new candidates this same tick.
            signals.update_on_tick(&symbol, price);

            for candidate in detect_all(&history, &snapshot) {
                signals.create_from_candidate(&symbol, &candidate, price, &snapshot);
            }
        });
    }
}

fn snapshot_from_history(history: &[PriceData]) -> IndicatorSnapshot {
    let highs: Vec<f64> = history.iter().map(|t| t.high).collect();
    let lows: Vec<f64> = history.iter().map(|t| t.low).collect();
    let closes: Vec<f64> = history.iter().map(|t| t.close).collect();
    let volumes: Vec<f64> = history.iter().map(|t| t.volume).collect();
    compute_all(&highs, &lows, &closes, &volumes)
}

// ---------------------------------------------------------------------------
// TradingSystem
// ---------------------------------------------------------------------------

pub struct TradingSystem {
    config: RuntimeConfig,
    db: Database,
    pairs: Arc<PairManager>,
    streamer: Arc<MultiPairStreamer>,
    signals: Arc<SignalManager>,
    running: AtomicBool,
    started_at: Mutex<Option<DateTime<Utc>>>,
    maintenance: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

fn build_sources(config: &RuntimeConfig) -> Vec<Arc<dyn QuoteSource>> {
    let streaming = &config.streaming;
    let mut sources: Vec<Arc<dyn QuoteSource>> = vec![
        Arc::new(ExchangeTickerSource::new(
            streaming.rate_limit_binance,
            streaming.connection_timeout_secs,
        )),
        Arc::new(AggregatorSource::new(
            streaming.rate_limit_coingecko,
            streaming.connection_timeout_secs,
        )),
    ];

    if streaming.fallback_to_simulated {
        sources.push(Arc::new(SimulatedSource::new(streaming.rate_limit_simulated)));
    }

    sources
}

impl TradingSystem {
    /// Initialise all subsystems.  A store or schema failure here is fatal:
    /// the system refuses to start without a working database.
    pub fn init(config: RuntimeConfig) -> Result<Self> {
        let sources = build_sources(&config);
        Self::with_sources(config, sources)
    }

    /// Initialise with an explicit source chain (tests inject simulated or
    /// stub sources here).
    pub fn with_sources(config: RuntimeConfig, sources: Vec<Arc<dyn QuoteSource>>) -> Result<Self> {
        let db = Database::open(&config.database.path)
            .context("fatal: could not open the trading database")?;

        let pairs = Arc::new(PairManager::new());
        let streamer = Arc::new(MultiPairStreamer::new(
            Arc::clone(&pairs),
            sources,
            config.streaming.update_interval_secs,
            config.streaming.max_workers,
        ));

        let signals = Arc::new(SignalManager::new(
            db.clone(),
            SignalSettings::from_config(&config),
        ));
        let recovered = signals
            .recover()
            .context("fatal: could not recover active signals")?;
        if recovered > 0 {
            info!(recovered, "signal recovery complete");
        }

        streamer.add_sink(Arc::new(StorageSink { db: db.clone() }));
        streamer.add_sink(Arc::new(AnalysisSink {
            db: db.clone(),
            signals: Arc::clone(&signals),
        }));

        db.save_system_log("INFO", "system", "system initialised", None).ok();

        let system = Self {
            config,
            db,
            pairs,
            streamer,
            signals,
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            maintenance: Mutex::new(None),
        };
        system.seed_configurations();
        Ok(system)
    }

    /// Persist the recognized configuration keys so operators can inspect
    /// the effective settings through the store.
    fn seed_configurations(&self) {
        let streaming = &self.config.streaming;
        let trading = &self.config.trading;
        let database = &self.config.database;
        let analytics = &self.config.analytics;

        let entries: [(&str, serde_json::Value, &str); 10] = [
            (
                "streaming.updateIntervalSec",
                serde_json::json!(streaming.update_interval_secs),
                "seconds between collection cycles",
            ),
            (
                "streaming.maxWorkers",
                serde_json::json!(streaming.max_workers),
                "worker-pool size for parallel fetches",
            ),
            (
                "streaming.connectionTimeoutSec",
                serde_json::json!(streaming.connection_timeout_secs),
                "per-HTTP-call timeout",
            ),
            (
                "streaming.fallbackToSimulated",
                serde_json::json!(streaming.fallback_to_simulated),
                "include the simulated source in the failover chain",
            ),
            (
                "trading.maxConcurrentSignals",
                serde_json::json!(trading.max_concurrent_signals),
                "cap on simultaneously active signals",
            ),
            (
                "trading.signalExpiryHours",
                serde_json::json!(trading.signal_expiry_hours),
                "hours before an unactivated signal expires",
            ),
            (
                "trading.minConfidenceThreshold",
                serde_json::json!(trading.min_confidence_threshold),
                "confidence floor on candidates",
            ),
            (
                "database.path",
                serde_json::json!(database.path),
                "store location",
            ),
            (
                "database.cleanupDays",
                serde_json::json!(database.cleanup_days),
                "retention window in days",
            ),
            (
                "analytics.historyDays",
                serde_json::json!(analytics.history_days),
                "reporting window in days",
            ),
        ];

        for (key, value, description) in entries {
            if let Err(e) = self.db.save_configuration(key, &value, Some(description)) {
                warn!(key, error = %e, "failed to persist configuration entry");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn start(&self) -> ApiResponse {
        if self.is_running() {
            return ApiResponse::err("system is already running");
        }

        if !self.streamer.start_all() {
            return ApiResponse::err("no enabled pair could start streaming");
        }

        let started_at = Utc::now();
        self.running.store(true, Ordering::SeqCst);
        *self.started_at.lock() = Some(started_at);

        // Housekeeping: expire stale signals even when their pair is quiet,
        // and enforce the retention window.
        {
            let signals = Arc::clone(&self.signals);
            let db = self.db.clone();
            let cleanup_days = self.config.database.cleanup_days;
            let handle = tokio::spawn(async move {
                let mut cycles: u64 = 0;
                loop {
                    tokio::time::sleep(std::time::Duration::from_secs(MAINTENANCE_INTERVAL_SECS))
                        .await;
                    signals.sweep_expired();

                    cycles += 1;
                    // Retention pass roughly once a day.
                    if cycles % (24 * 60) == 0 {
                        let db = db.clone();
                        let _ = tokio::task::spawn_blocking(move || {
                            if let Err(e) = db.cleanup_older_than(cleanup_days) {
                                error!(error = %e, "retention cleanup failed");
                            }
                        })
                        .await;
                    }
                }
            });
            *self.maintenance.lock() = Some(handle);
        }

        let enabled = self.pairs.enabled_pairs().len();
        self.db
            .save_system_log("INFO", "system", "system started", None)
            .ok();
        info!(enabled_pairs = enabled, "system started");

        ApiResponse {
            success: true,
            message: Some("system started".to_string()),
            data: Some(serde_json::json!({
                "started_at": started_at.to_rfc3339(),
                "enabled_pairs": enabled,
            })),
            error: None,
        }
    }

    pub async fn stop(&self) -> ApiResponse {
        if !self.is_running() {
            return ApiResponse::err("system is not running");
        }

        self.streamer.stop_all().await;
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.maintenance.lock().take() {
            handle.abort();
        }

        self.db
            .save_system_log("INFO", "system", "system stopped", None)
            .ok();
        info!("system stopped");
        ApiResponse::ok("system stopped")
    }

    pub async fn restart(&self) -> ApiResponse {
        info!("restarting system");
        if self.is_running() {
            let stopped = self.stop().await;
            if !stopped.success {
                return stopped;
            }
        }
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        self.start()
    }

    // -------------------------------------------------------------------------
    // Status & health
    // -------------------------------------------------------------------------

    pub fn status(&self) -> serde_json::Value {
        let started_at = *self.started_at.lock();
        let uptime_secs = started_at
            .filter(|_| self.is_running())
            .map(|t| (Utc::now() - t).num_seconds().max(0))
            .unwrap_or(0);

        serde_json::json!({
            "is_running": self.is_running(),
            "started_at": started_at.map(|t| t.to_rfc3339()),
            "uptime_seconds": uptime_secs,
            "active_signals": self.signals.active_count(),
            "streaming": self.streamer.stats()["summary"],
            "pairs": self.pairs.summary(),
        })
    }

    /// Component-level health map: database, streaming, pairs.
    pub fn health(&self) -> serde_json::Value {
        let database = self.db.health_check();
        let streaming = self.streamer.health_check();
        let pairs = self.pairs.health_report();

        let db_ok = database["status"] == "healthy" || database["status"] == "warning";
        let streaming_status = streaming["status"].as_str().unwrap_or("unknown");
        let streaming_ok = streaming_status != "critical";
        let overall = if !db_ok {
            "unhealthy"
        } else if !streaming_ok {
            "critical"
        } else if streaming_status == "degraded" || pairs["overall_health"] == "degraded" {
            "degraded"
        } else {
            "healthy"
        };

        serde_json::json!({
            "status": overall,
            "components": {
                "database": database,
                "streaming": streaming,
                "pairs": pairs,
            },
        })
    }

    // -------------------------------------------------------------------------
    // Pair operations
    // -------------------------------------------------------------------------

    pub fn pairs_list(&self) -> serde_json::Value {
        let list: Vec<serde_json::Value> = self
            .pairs
            .all_pairs()
            .iter()
            .map(|p| p.status_payload())
            .collect();
        serde_json::json!(list)
    }

    pub fn pairs_enabled(&self) -> serde_json::Value {
        let list: Vec<serde_json::Value> = self
            .pairs
            .enabled_pairs()
            .iter()
            .map(|p| p.status_payload())
            .collect();
        serde_json::json!(list)
    }

    pub fn pairs_summary(&self) -> serde_json::Value {
        self.pairs.summary()
    }

    pub fn pair_start(&self, symbol: &str) -> ApiResponse {
        if !self.streamer.start_pair(symbol) {
            return ApiResponse::err(format!("could not start streaming for {symbol}"));
        }

        // Starting a single pair while the scheduler is idle brings the
        // whole loop up, matching the system-level start semantics.
        if self.is_running() && !self.streamer.is_running() {
            self.streamer.start_all();
        }

        ApiResponse::ok(format!("streaming started for {symbol}"))
    }

    pub fn pair_stop(&self, symbol: &str) -> ApiResponse {
        if self.streamer.stop_pair(symbol) {
            ApiResponse::ok(format!("streaming stopped for {symbol}"))
        } else {
            ApiResponse::err(format!("{symbol} was not streaming"))
        }
    }

    pub fn pair_status(&self, symbol: &str) -> ApiResponse {
        match self.pairs.get_pair(symbol) {
            Some(pair) => ApiResponse::with_data(pair.status_payload()),
            None => ApiResponse::err(format!("unknown pair {symbol}")),
        }
    }

    /// Recent ticks for a pair; `limit` is clamped into 1..=1000.
    pub fn pair_data(&self, symbol: &str, limit: usize) -> ApiResponse {
        let limit = limit.clamp(1, 1000);
        match self.pairs.get_pair(symbol) {
            Some(pair) => {
                let ticks = pair.history(Some(limit));
                ApiResponse::with_data(serde_json::json!(ticks))
            }
            None => ApiResponse::err(format!("unknown pair {symbol}")),
        }
    }

    pub fn pair_update_config(&self, symbol: &str, update: &PairConfigUpdate) -> ApiResponse {
        if self.pairs.update_pair_config(symbol, update) {
            ApiResponse::ok(format!("configuration updated for {symbol}"))
        } else {
            ApiResponse::err(format!("unknown pair {symbol}"))
        }
    }

    /// Price aggregate over a trailing window of hours.
    pub fn pair_range(&self, symbol: &str, hours: i64) -> ApiResponse {
        match self.pairs.get_pair(symbol) {
            Some(pair) => {
                let range = pair.range(hours.clamp(1, 24 * 365));
                ApiResponse::with_data(serde_json::json!(range))
            }
            None => ApiResponse::err(format!("unknown pair {symbol}")),
        }
    }

    // -------------------------------------------------------------------------
    // Trading operations
    // -------------------------------------------------------------------------

    pub fn trading_signals(&self, limit: usize, status_filter: Option<&str>) -> ApiResponse {
        let status = match status_filter {
            Some(raw) => match SignalStatus::parse(raw) {
                Some(status) => Some(status),
                None => return ApiResponse::err(format!("unknown status filter {raw}")),
            },
            None => None,
        };

        match self.db.get_signals(None, status, limit.clamp(1, 1000)) {
            Ok(signals) => ApiResponse::with_data(serde_json::json!(signals)),
            Err(e) => ApiResponse::err(format!("could not load signals: {e}")),
        }
    }

    /// Live indicator snapshot for one symbol, or all enabled symbols.
    pub fn trading_indicators(&self, symbol: Option<&str>) -> ApiResponse {
        let targets: Vec<Arc<TradingPair>> = match symbol {
            Some(sym) => match self.pairs.get_pair(sym) {
                Some(pair) => vec![pair],
                None => return ApiResponse::err(format!("unknown pair {sym}")),
            },
            None => self.pairs.enabled_pairs(),
        };

        let mut result = serde_json::Map::new();
        for pair in targets {
            let history = pair.history(None);
            let snapshot = snapshot_from_history(&history);
            result.insert(
                pair.symbol().to_string(),
                serde_json::to_value(&snapshot).unwrap_or_default(),
            );
        }

        ApiResponse::with_data(serde_json::Value::Object(result))
    }

    pub fn trading_pattern_stats(&self) -> ApiResponse {
        match self.db.pattern_stats() {
            Ok(stats) => ApiResponse::with_data(stats),
            Err(e) => ApiResponse::err(format!("could not load pattern stats: {e}")),
        }
    }

    /// Persisted indicator rows for a symbol, newest first.
    pub fn indicator_history(
        &self,
        symbol: &str,
        name: Option<&str>,
        limit: usize,
    ) -> ApiResponse {
        match self.db.get_indicators(symbol, name, "5m", limit.clamp(1, 1000)) {
            Ok(rows) => ApiResponse::with_data(serde_json::json!(rows)),
            Err(e) => ApiResponse::err(format!("could not load indicators: {e}")),
        }
    }

    pub fn create_manual_signal(
        &self,
        symbol: &str,
        signal_type: &str,
        entry: f64,
        target: Option<f64>,
        stop: Option<f64>,
    ) -> ApiResponse {
        let Some(pair) = self.pairs.get_pair(symbol) else {
            return ApiResponse::err(format!("unknown pair {symbol}"));
        };
        let Some(latest) = pair.latest() else {
            return ApiResponse::err(format!("no market data for {symbol} yet"));
        };

        let history = pair.history(None);
        let snapshot = snapshot_from_history(&history);

        match self.signals.create_manual(
            pair.symbol(),
            signal_type,
            entry,
            target,
            stop,
            latest.price,
            &snapshot,
        ) {
            Some(signal) => ApiResponse {
                success: true,
                message: Some("manual signal created".to_string()),
                data: Some(serde_json::json!({ "signal_id": signal.signal_id })),
                error: None,
            },
            None => ApiResponse::err("manual signal rejected by validation"),
        }
    }

    pub fn close_signal(&self, signal_id: &str, reason: &str) -> ApiResponse {
        if self.signals.close_signal(signal_id, reason) {
            ApiResponse::ok(format!("signal {signal_id} closed"))
        } else {
            ApiResponse::err(format!("signal {signal_id} is not active"))
        }
    }

    // -------------------------------------------------------------------------
    // Maintenance operations
    // -------------------------------------------------------------------------

    pub fn reset_all_errors(&self) -> ApiResponse {
        self.streamer.reset_all_errors();
        ApiResponse::ok("all error counters reset")
    }

    /// Recent persisted system logs, optionally filtered.
    pub fn system_logs(
        &self,
        level: Option<&str>,
        component: Option<&str>,
        hours: i64,
        limit: usize,
    ) -> ApiResponse {
        match self
            .db
            .get_system_logs(level, component, hours.clamp(1, 24 * 30), limit.clamp(1, 1000))
        {
            Ok(logs) => ApiResponse::with_data(serde_json::json!(logs)),
            Err(e) => ApiResponse::err(format!("could not load logs: {e}")),
        }
    }

    /// Effective configuration entries as persisted in the store.
    pub fn configurations(&self) -> ApiResponse {
        match self.db.get_all_configurations() {
            Ok(configs) => ApiResponse::with_data(configs),
            Err(e) => ApiResponse::err(format!("could not load configurations: {e}")),
        }
    }

    /// Aggregate summary of stored price data and signals.
    pub fn data_summary(&self, symbol: Option<&str>) -> ApiResponse {
        match self.db.data_summary(symbol) {
            Ok(summary) => ApiResponse::with_data(summary),
            Err(e) => ApiResponse::err(format!("could not build data summary: {e}")),
        }
    }

    /// Apply new streaming settings to the live scheduler and sources.
    /// Worker-pool size changes only take effect while stopped.
    pub fn update_streaming_config(&self, streaming: &crate::runtime_config::StreamingConfig) -> ApiResponse {
        self.streamer.set_update_interval_secs(streaming.update_interval_secs);
        self.streamer.set_max_workers(streaming.max_workers);

        for source in self.streamer.sources() {
            let rate = match source.name() {
                "Binance" => streaming.rate_limit_binance,
                "CoinGecko" => streaming.rate_limit_coingecko,
                "Simulated" => streaming.rate_limit_simulated,
                _ => continue,
            };
            source.set_rate_limit_secs(rate);
        }

        ApiResponse::ok("streaming configuration applied")
    }

    pub fn cleanup(&self) -> ApiResponse {
        let days = self.config.database.cleanup_days;
        let removed = match self.db.cleanup_older_than(days) {
            Ok(removed) => removed,
            Err(e) => return ApiResponse::err(format!("cleanup failed: {e}")),
        };
        let removed_signals = match self.signals.cleanup() {
            Ok(count) => count,
            Err(e) => return ApiResponse::err(format!("signal cleanup failed: {e}")),
        };

        if let Err(e) = self.db.optimize() {
            warn!(error = %e, "post-cleanup optimization failed");
        }

        ApiResponse::with_data(serde_json::json!({
            "removed": removed,
            "removed_signals": removed_signals,
            "retention_days": days,
        }))
    }

    pub fn backup(&self, path: Option<&str>) -> ApiResponse {
        let target = match path {
            Some(p) => p.to_string(),
            None => {
                let stamp = Utc::now().format("%Y%m%d_%H%M%S");
                format!("data/backup_trading_system_{stamp}.db")
            }
        };

        match self.db.backup(&target) {
            Ok(()) => ApiResponse::with_data(serde_json::json!({ "backup_path": target })),
            Err(e) => {
                warn!(error = %e, "backup failed");
                ApiResponse::err(format!("backup failed: {e}"))
            }
        }
    }

    pub fn export_pair_config(&self) -> serde_json::Value {
        self.pairs.export_config()
    }

    pub fn import_pair_config(&self, config: &serde_json::Value) -> ApiResponse {
        if self.pairs.import_config(config) {
            ApiResponse::ok("pair configuration imported")
        } else {
            ApiResponse::err("invalid pair configuration payload")
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.database.path = dir.join("system.db").to_string_lossy().into_owned();
        config.streaming.update_interval_secs = 1;
        config
    }

    fn simulated_only() -> Vec<Arc<dyn QuoteSource>> {
        vec![Arc::new(SimulatedSource::new(0.0))]
    }

    #[tokio::test]
    async fn init_creates_subsystems_and_recovers() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        assert!(!system.is_running());
        let status = system.status();
        assert_eq!(status["is_running"], false);
        assert_eq!(status["active_signals"], 0);
        assert_eq!(status["pairs"]["total_pairs"], 7);
    }

    #[tokio::test]
    async fn start_collects_and_stop_halts() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        let started = system.start();
        assert!(started.success, "{:?}", started.error);
        assert!(system.is_running());

        // Double start is rejected.
        assert!(!system.start().success);

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        let stopped = system.stop().await;
        assert!(stopped.success);
        assert!(!system.is_running());

        // The enabled pairs collected at least one tick each cycle.
        let btc = system.pairs.get_pair("BTCUSDT").unwrap();
        assert!(btc.history_len() >= 1);

        // Stop again fails.
        assert!(!system.stop().await.success);
    }

    #[tokio::test]
    async fn pair_surface_operations() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        assert!(system.pair_start("BTCUSDT").success);
        assert!(system.pair_stop("BTCUSDT").success);
        assert!(!system.pair_stop("BTCUSDT").success);
        assert!(!system.pair_start("UNKNOWN").success);

        let status = system.pair_status("BTCUSDT");
        assert!(status.success);
        assert_eq!(status.data.unwrap()["symbol"], "BTCUSDT");

        assert!(system
            .pair_update_config(
                "BTCUSDT",
                &PairConfigUpdate {
                    update_interval_secs: Some(9),
                    ..Default::default()
                },
            )
            .success);
        assert_eq!(
            system.pairs.get_pair("BTCUSDT").unwrap().config().update_interval_secs,
            9
        );
    }

    #[tokio::test]
    async fn pair_data_clamps_limit() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        let pair = system.pairs.get_pair("BTCUSDT").unwrap();
        for i in 0..5 {
            pair.add_tick(PriceData::from_price_only(
                "BTCUSDT",
                45_000.0 + i as f64,
                1000.0,
                "Test",
            ));
        }

        let response = system.pair_data("BTCUSDT", 0);
        let data = response.data.unwrap();
        // Limit 0 clamps to 1: only the newest tick.
        assert_eq!(data.as_array().unwrap().len(), 1);

        let all = system.pair_data("BTCUSDT", 50_000).data.unwrap();
        assert_eq!(all.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn manual_signal_round_trip() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        // No market data yet: rejected.
        assert!(!system
            .create_manual_signal("BTCUSDT", "BUY", 45_000.0, None, None)
            .success);

        // Seed enough history for market-condition validation.
        let pair = system.pairs.get_pair("BTCUSDT").unwrap();
        for i in 0..40 {
            pair.add_tick(PriceData::from_price_only(
                "BTCUSDT",
                45_000.0 + (i % 7) as f64 * 10.0,
                1000.0,
                "Test",
            ));
        }

        let latest = pair.latest().unwrap().price;
        let created = system.create_manual_signal("BTCUSDT", "BUY", latest, None, None);
        assert!(created.success, "{:?}", created.error);

        let signal_id = created.data.unwrap()["signal_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(system.signals.active_count(), 1);

        assert!(system.close_signal(&signal_id, "operator").success);
        assert!(!system.close_signal(&signal_id, "operator").success);
        assert_eq!(system.signals.active_count(), 0);
    }

    #[tokio::test]
    async fn trading_surface_queries() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        assert!(system.trading_signals(10, None).success);
        assert!(system.trading_signals(10, Some("ACTIVE")).success);
        assert!(!system.trading_signals(10, Some("BOGUS")).success);
        assert!(system.trading_pattern_stats().success);

        let indicators = system.trading_indicators(Some("BTCUSDT"));
        assert!(indicators.success);
        assert!(indicators.data.unwrap().get("BTCUSDT").is_some());
        assert!(!system.trading_indicators(Some("UNKNOWN")).success);
    }

    #[tokio::test]
    async fn health_reports_components() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        let health = system.health();
        assert!(health["components"]["database"]["status"] == "healthy");
        assert!(health["components"]["streaming"].is_object());
        assert!(health["components"]["pairs"].is_object());
    }

    #[tokio::test]
    async fn backup_and_cleanup_operations() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        let target = dir.path().join("backup.db").to_string_lossy().into_owned();
        assert!(system.backup(Some(&target)).success);
        assert!(std::path::Path::new(&target).exists());

        assert!(system.cleanup().success);
    }

    #[tokio::test]
    async fn operational_queries_and_config_updates() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        // Init seeded the recognized configuration keys.
        let configs = system.configurations();
        assert!(configs.success);
        let data = configs.data.unwrap();
        assert_eq!(data["streaming.updateIntervalSec"], 1);
        assert_eq!(data["database.cleanupDays"], 30);

        // Init wrote at least one system log row.
        let logs = system.system_logs(None, Some("system"), 24, 50);
        assert!(logs.success);
        assert!(!logs.data.unwrap().as_array().unwrap().is_empty());

        assert!(system.data_summary(None).success);
        assert!(system.data_summary(Some("BTCUSDT")).success);
        assert!(system.indicator_history("BTCUSDT", Some("RSI"), 10).success);

        // Range over an empty series is all zeros.
        let range = system.pair_range("BTCUSDT", 24);
        assert!(range.success);
        assert_eq!(range.data.unwrap()["count"], 0);
        assert!(!system.pair_range("UNKNOWN", 24).success);

        // Hot streaming-config update reaches the sources.
        let mut streaming = system.config.streaming.clone();
        streaming.update_interval_secs = 3;
        streaming.rate_limit_simulated = 0.2;
        assert!(system.update_streaming_config(&streaming).success);
        let simulated = system
            .streamer
            .sources()
            .iter()
            .find(|s| s.name() == "Simulated")
            .unwrap();
        assert!((simulated.rate_limit_secs() - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pair_config_export_import_round_trip() {
        let dir = tempdir().unwrap();
        let system = TradingSystem::with_sources(test_config(dir.path()), simulated_only()).unwrap();

        let exported = system.export_pair_config();
        assert!(system.import_pair_config(&exported).success);
        assert_eq!(system.export_pair_config()["pairs"], exported["pairs"]);
        assert!(!system.import_pair_config(&serde_json::json!({})).success);
    }
}
