// =============================================================================
// Multi-Pair Streamer — periodic collection across all streaming pairs
// =============================================================================
//
// One scheduler task drives the collection cadence; each cycle fans fetches
// out over a bounded worker pool.  Per pair, sources are tried in priority
// order and the first successful tick wins.  Accepted ticks are validated
// (price band, 10% jump cap), deduplicated (same source and price within
// 2 s), committed to the pair's series, and handed to the registered
// `TickSink`s.
//
// Cancellation is cooperative: `stop_all` clears the running flag, wakes the
// cadence wait, and joins the scheduler task with a bounded wait.  In-flight
// fetches are allowed to finish.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::market_data::{PairManager, TradingPair};
use crate::sources::QuoteSource;
use crate::types::PriceData;

/// Hard deadline for one collection cycle.
const CYCLE_DEADLINE: Duration = Duration::from_secs(30);
/// Bounded wait when joining the scheduler task on shutdown.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);
/// Consecutive all-pairs-failed cycles before the escalation pause.
const MAX_FAILED_CYCLES: u32 = 10;
/// Escalation pause after repeated total failure.
const FAILURE_PAUSE: Duration = Duration::from_secs(60);
/// Same-source ticks with an identical price within this window are dupes.
const DEDUP_WINDOW_MS: i64 = 2_000;
/// Maximum accepted move relative to the last committed price.
const MAX_PRICE_JUMP: f64 = 0.10;

// ---------------------------------------------------------------------------
// TickSink
// ---------------------------------------------------------------------------

/// A consumer of accepted ticks.  The streamer holds a list of sinks; the
/// persistence store and the analysis engine are the concrete implementors.
pub trait TickSink: Send + Sync {
    fn name(&self) -> &'static str;
    fn on_tick(&self, pair: &Arc<TradingPair>, tick: &PriceData);
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StatsInner {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    sources_used: HashMap<String, u64>,
    start_time: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
}

enum TickReject {
    Duplicate,
    Invalid(String),
}

// ---------------------------------------------------------------------------
// MultiPairStreamer
// ---------------------------------------------------------------------------

pub struct MultiPairStreamer {
    pairs: Arc<PairManager>,
    sources: Vec<Arc<dyn QuoteSource>>,
    sinks: RwLock<Vec<Arc<dyn TickSink>>>,
    stats: Mutex<StatsInner>,
    running: AtomicBool,
    stop_notify: Notify,
    update_interval_secs: AtomicU64,
    max_workers: AtomicUsize,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MultiPairStreamer {
    pub fn new(
        pairs: Arc<PairManager>,
        sources: Vec<Arc<dyn QuoteSource>>,
        update_interval_secs: u64,
        max_workers: usize,
    ) -> Self {
        Self {
            pairs,
            sources,
            sinks: RwLock::new(Vec::new()),
            stats: Mutex::new(StatsInner::default()),
            running: AtomicBool::new(false),
            stop_notify: Notify::new(),
            update_interval_secs: AtomicU64::new(update_interval_secs.max(1)),
            max_workers: AtomicUsize::new(max_workers.clamp(1, 20)),
            task: Mutex::new(None),
        }
    }

    /// Register a tick consumer.  Sinks are invoked in registration order on
    /// every accepted tick.
    pub fn add_sink(&self, sink: Arc<dyn TickSink>) {
        info!(sink = sink.name(), "tick sink registered");
        self.sinks.write().push(sink);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_update_interval_secs(&self, secs: u64) {
        self.update_interval_secs.store(secs.max(1), Ordering::SeqCst);
        info!(secs = secs.max(1), "update interval changed");
    }

    /// Worker-pool size; only applied while stopped.
    pub fn set_max_workers(&self, workers: usize) {
        if self.is_running() {
            warn!("cannot resize worker pool while streaming");
            return;
        }
        self.max_workers.store(workers.clamp(1, 20), Ordering::SeqCst);
    }

    pub fn sources(&self) -> &[Arc<dyn QuoteSource>] {
        &self.sources
    }

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------

    /// Begin the background collection loop.  Returns false when already
    /// running or when no enabled pair could start streaming.
    pub fn start_all(self: &Arc<Self>) -> bool {
        if self.is_running() {
            warn!("streaming already running");
            return false;
        }

        if self.pairs.enabled_pairs().is_empty() {
            warn!("no enabled pairs to stream");
            return false;
        }

        let started = self.pairs.start_all_streaming();
        if started == 0 {
            error!("no pair could start streaming");
            return false;
        }

        self.running.store(true, Ordering::SeqCst);
        self.stats.lock().start_time = Some(Utc::now());

        let streamer = Arc::clone(self);
        let handle = tokio::spawn(async move {
            streamer.streaming_loop().await;
        });
        *self.task.lock() = Some(handle);

        info!(pairs = started, "streaming started");
        true
    }

    /// Cooperatively stop: clear the flag, wake the cadence wait, stop pair
    /// streaming, and join the scheduler task with a bounded wait.
    pub async fn stop_all(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("streaming is not running");
            return;
        }

        info!("stopping streaming");
        self.stop_notify.notify_waiters();
        self.pairs.stop_all_streaming();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!("scheduler task did not finish within the stop timeout");
            }
        }

        info!("streaming stopped");
    }

    /// Start streaming a single pair.  Does not start the scheduler loop —
    /// the system facade owns that decision.
    pub fn start_pair(&self, symbol: &str) -> bool {
        match self.pairs.get_pair(symbol) {
            Some(pair) => pair.start_streaming(),
            None => {
                warn!(symbol, "cannot start unknown pair");
                false
            }
        }
    }

    pub fn stop_pair(&self, symbol: &str) -> bool {
        match self.pairs.get_pair(symbol) {
            Some(pair) if pair.is_streaming() => {
                pair.stop_streaming();
                true
            }
            Some(_) => {
                warn!(symbol, "pair was not streaming");
                false
            }
            None => {
                warn!(symbol, "cannot stop unknown pair");
                false
            }
        }
    }

    /// Reset error counters on every source and pair.
    pub fn reset_all_errors(&self) {
        for source in &self.sources {
            source.reset_errors();
        }
        self.pairs.reset_all_errors();
        info!("all source and pair errors reset");
    }

    // -------------------------------------------------------------------------
    // Scheduler loop
    // -------------------------------------------------------------------------

    async fn streaming_loop(&self) {
        info!("streaming loop started");
        let mut consecutive_failed_cycles: u32 = 0;

        while self.is_running() {
            let had_streaming_pairs = !self.pairs.streaming_pairs().is_empty();

            let successes = match tokio::time::timeout(CYCLE_DEADLINE, self.collect_all()).await {
                Ok(count) => count,
                Err(_) => {
                    warn!(deadline_secs = CYCLE_DEADLINE.as_secs(), "collection cycle hit deadline");
                    0
                }
            };

            self.stats.lock().last_update = Some(Utc::now());

            if had_streaming_pairs && successes == 0 {
                consecutive_failed_cycles += 1;
            } else {
                consecutive_failed_cycles = 0;
            }

            if consecutive_failed_cycles >= MAX_FAILED_CYCLES {
                warn!(
                    cycles = consecutive_failed_cycles,
                    pause_secs = FAILURE_PAUSE.as_secs(),
                    "repeated total fetch failure — pausing collection"
                );
                consecutive_failed_cycles = 0;
                if !self.interruptible_wait(FAILURE_PAUSE).await {
                    break;
                }
            }

            let interval = Duration::from_secs(self.update_interval_secs.load(Ordering::SeqCst));
            if !self.interruptible_wait(interval).await {
                break;
            }
        }

        info!("streaming loop finished");
    }

    /// Sleep for `duration`, returning false when woken by the stop signal.
    async fn interruptible_wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.stop_notify.notified() => false,
            _ = tokio::time::sleep(duration) => self.is_running(),
        }
    }

    /// One collection cycle over the current snapshot of streaming pairs.
    /// Returns the number of pairs fetched successfully.
    async fn collect_all(&self) -> usize {
        let streaming = self.pairs.streaming_pairs();
        if streaming.is_empty() {
            return 0;
        }

        let requested = streaming.len() as u64;
        let successes = AtomicUsize::new(0);
        let workers = self.max_workers.load(Ordering::SeqCst);

        futures_util::stream::iter(streaming)
            .for_each_concurrent(workers, |pair| {
                let successes = &successes;
                async move {
                    if self.collect_pair(&pair).await {
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        self.stats.lock().total_requests += requested;
        successes.load(Ordering::Relaxed)
    }

    /// Fetch one pair, rotating through sources in priority order.  The
    /// first successful tick is validated, deduplicated and committed.
    async fn collect_pair(&self, pair: &Arc<TradingPair>) -> bool {
        let symbol = pair.symbol().to_string();

        for source in &self.sources {
            if !source.is_available() {
                continue;
            }

            let Some(tick) = source.fetch(&symbol).await else {
                continue;
            };

            {
                let mut stats = self.stats.lock();
                stats.successful_requests += 1;
                *stats.sources_used.entry(source.name().to_string()).or_insert(0) += 1;
            }

            match self.validate_tick(pair, &tick) {
                Ok(()) => {}
                Err(TickReject::Duplicate) => {
                    debug!(symbol = %symbol, price = tick.price, "duplicate tick dropped");
                    return true;
                }
                Err(TickReject::Invalid(reason)) => {
                    debug!(symbol = %symbol, price = tick.price, reason, "tick rejected");
                    return true;
                }
            }

            if !pair.add_tick(tick.clone()) {
                return true;
            }

            for sink in self.sinks.read().iter() {
                sink.on_tick(pair, &tick);
            }
            return true;
        }

        warn!(symbol = %symbol, "all quote sources failed");
        pair.record_failure("all quote sources failed");
        self.stats.lock().failed_requests += 1;
        false
    }

    /// Tick-level validation against the pair's committed series.
    fn validate_tick(&self, pair: &TradingPair, tick: &PriceData) -> Result<(), TickReject> {
        if tick.price <= 0.0 {
            return Err(TickReject::Invalid("non-positive price".to_string()));
        }

        if let Some((low, high)) = pair.price_band() {
            if tick.price < low || tick.price > high {
                return Err(TickReject::Invalid(format!(
                    "price {:.2} outside band [{:.0}, {:.0}]",
                    tick.price, low, high
                )));
            }
        }

        if let Some(prev) = pair.latest() {
            let age_ms = (tick.timestamp - prev.timestamp).num_milliseconds();
            if tick.source == prev.source && tick.price == prev.price && age_ms.abs() < DEDUP_WINDOW_MS
            {
                return Err(TickReject::Duplicate);
            }

            if prev.price > 0.0 {
                let jump = (tick.price - prev.price).abs() / prev.price;
                if jump > MAX_PRICE_JUMP {
                    return Err(TickReject::Invalid(format!(
                        "price jump {:.1}% exceeds {:.0}% cap",
                        jump * 100.0,
                        MAX_PRICE_JUMP * 100.0
                    )));
                }
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Statistics & health
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> serde_json::Value {
        let stats = self.stats.lock();

        let uptime_secs = stats
            .start_time
            .map(|t| (Utc::now() - t).num_seconds().max(0))
            .unwrap_or(0);
        let success_rate = if stats.total_requests > 0 {
            stats.successful_requests as f64 / stats.total_requests as f64 * 100.0
        } else {
            0.0
        };

        let total_data_points: usize =
            self.pairs.all_pairs().iter().map(|p| p.history_len()).sum();
        let data_points_per_minute = if uptime_secs > 0 {
            total_data_points as f64 / (uptime_secs as f64 / 60.0)
        } else {
            0.0
        };

        let mut sources = serde_json::Map::new();
        for source in &self.sources {
            sources.insert(
                source.name().to_string(),
                serde_json::json!({
                    "is_available": source.is_available(),
                    "error_count": source.error_count(),
                    "requests_made": stats.sources_used.get(source.name()).copied().unwrap_or(0),
                    "rate_limit_secs": source.rate_limit_secs(),
                }),
            );
        }

        let mut pairs_status = serde_json::Map::new();
        for pair in self.pairs.all_pairs() {
            pairs_status.insert(pair.symbol().to_string(), pair.status_payload());
        }

        serde_json::json!({
            "summary": {
                "is_running": self.is_running(),
                "uptime_seconds": uptime_secs,
                "active_streams": self.pairs.streaming_pairs().len(),
                "total_pairs": self.pairs.all_pairs().len(),
                "total_data_points": total_data_points,
                "data_points_per_minute": data_points_per_minute,
                "total_requests": stats.total_requests,
                "successful_requests": stats.successful_requests,
                "failed_requests": stats.failed_requests,
                "success_rate": success_rate,
                "last_update": stats.last_update.map(|t| t.to_rfc3339()),
            },
            "sources": sources,
            "pairs_status": pairs_status,
        })
    }

    /// Overall streaming health: healthy / degraded / warning / critical /
    /// stopped, with the list of findings.
    pub fn health_check(&self) -> serde_json::Value {
        let mut issues: Vec<String> = Vec::new();
        let mut status = "healthy";

        if !self.is_running() {
            issues.push("streaming is not running".to_string());
            status = "stopped";
        }

        let available = self.sources.iter().filter(|s| s.is_available()).count();
        if available == 0 {
            issues.push("no quote source available".to_string());
            status = "critical";
        } else if available == 1 && status == "healthy" {
            issues.push("only one quote source available".to_string());
            status = "degraded";
        }

        let streaming = self.pairs.streaming_pairs();
        let healthy = streaming.iter().filter(|p| p.is_streaming_healthy()).count();
        if streaming.is_empty() {
            if status == "healthy" {
                issues.push("no pair is streaming".to_string());
                status = "warning";
            }
        } else if healthy < streaming.len() {
            issues.push(format!("{} pairs unhealthy", streaming.len() - healthy));
            if status == "healthy" {
                status = "degraded";
            }
        }

        let (error_rate, total, uptime_secs) = {
            let stats = self.stats.lock();
            let rate = if stats.total_requests > 0 {
                stats.failed_requests as f64 / stats.total_requests as f64 * 100.0
            } else {
                0.0
            };
            let uptime = stats
                .start_time
                .map(|t| (Utc::now() - t).num_seconds().max(0))
                .unwrap_or(0);
            (rate, stats.total_requests, uptime)
        };
        if total > 0 && error_rate > 20.0 {
            issues.push(format!("high error rate: {error_rate:.1}%"));
            if status == "healthy" {
                status = "degraded";
            }
        }

        // Ingestion throughput is reported informationally; stale pairs and
        // the error rate already cover the degraded cases it would signal.
        let total_data_points: usize =
            self.pairs.all_pairs().iter().map(|p| p.history_len()).sum();
        let data_points_per_minute = if uptime_secs > 0 {
            total_data_points as f64 / (uptime_secs as f64 / 60.0)
        } else {
            0.0
        };

        serde_json::json!({
            "status": status,
            "issues": issues,
            "available_sources": available,
            "total_sources": self.sources.len(),
            "healthy_pairs": healthy,
            "streaming_pairs": streaming.len(),
            "error_rate": error_rate,
            "data_points_per_minute": data_points_per_minute,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::pair::PairConfig;
    use crate::sources::{SimulatedSource, SourceHealth};
    use async_trait::async_trait;

    struct CountingSink {
        ticks: AtomicUsize,
    }

    impl TickSink for CountingSink {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn on_tick(&self, _pair: &Arc<TradingPair>, _tick: &PriceData) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Source that fails every fetch, for failover tests.
    struct BrokenSource {
        health: SourceHealth,
    }

    impl BrokenSource {
        fn new() -> Self {
            Self {
                health: SourceHealth::new("Broken"),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for BrokenSource {
        fn name(&self) -> &str {
            "Broken"
        }
        fn rate_limit_secs(&self) -> f64 {
            0.0
        }
        fn set_rate_limit_secs(&self, _secs: f64) {}
        fn is_available(&self) -> bool {
            self.health.is_available()
        }
        fn error_count(&self) -> u32 {
            self.health.error_count()
        }
        fn reset_errors(&self) {
            self.health.reset();
        }
        async fn fetch(&self, _symbol: &str) -> Option<PriceData> {
            self.health.record_error("simulated outage");
            None
        }
    }

    fn test_pairs() -> Arc<PairManager> {
        let pairs = Arc::new(PairManager::empty());
        pairs.add_pair("BTCUSDT", PairConfig::new("Bitcoin/USDT", true, "#f7931a", "btc"));
        pairs
    }

    fn test_streamer(
        pairs: Arc<PairManager>,
        sources: Vec<Arc<dyn QuoteSource>>,
    ) -> Arc<MultiPairStreamer> {
        Arc::new(MultiPairStreamer::new(pairs, sources, 1, 5))
    }

    #[tokio::test]
    async fn collects_ticks_and_feeds_sinks() {
        let pairs = test_pairs();
        let streamer = test_streamer(pairs.clone(), vec![Arc::new(SimulatedSource::new(0.0))]);
        let sink = Arc::new(CountingSink {
            ticks: AtomicUsize::new(0),
        });
        streamer.add_sink(sink.clone());

        assert!(streamer.start_all());
        assert!(!streamer.start_all(), "second start must be rejected");

        tokio::time::sleep(Duration::from_millis(300)).await;
        streamer.stop_all().await;

        let pair = pairs.get_pair("BTCUSDT").unwrap();
        assert!(pair.history_len() >= 1);
        assert!(sink.ticks.load(Ordering::Relaxed) >= 1);
        assert!(!streamer.is_running());
        assert!(!pair.is_streaming());

        let stats = streamer.stats();
        assert!(stats["summary"]["data_points_per_minute"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn throughput_is_zero_without_uptime() {
        let pairs = test_pairs();
        let streamer = test_streamer(pairs.clone(), vec![]);

        // Data on hand but the scheduler never started: no uptime, no rate.
        let pair = pairs.get_pair("BTCUSDT").unwrap();
        pair.add_tick(PriceData::from_price_only("BTCUSDT", 45_000.0, 1000.0, "S"));

        let stats = streamer.stats();
        assert_eq!(stats["summary"]["total_data_points"], 1);
        assert_eq!(stats["summary"]["data_points_per_minute"], 0.0);

        let health = streamer.health_check();
        assert_eq!(health["data_points_per_minute"], 0.0);
    }

    #[tokio::test]
    async fn start_fails_without_enabled_pairs() {
        let pairs = Arc::new(PairManager::empty());
        let streamer = test_streamer(pairs, vec![Arc::new(SimulatedSource::new(0.0))]);
        assert!(!streamer.start_all());
    }

    #[tokio::test]
    async fn failover_skips_broken_source() {
        let pairs = test_pairs();
        let broken = Arc::new(BrokenSource::new());
        let streamer = test_streamer(
            pairs.clone(),
            vec![broken.clone(), Arc::new(SimulatedSource::new(0.0))],
        );

        let pair = pairs.get_pair("BTCUSDT").unwrap();
        pair.start_streaming();

        // Every cycle the broken source errors once, then the fallback
        // delivers.  After five failures it leaves the rotation.
        for _ in 0..6 {
            assert!(streamer.collect_pair(&pair).await);
        }
        assert!(!broken.is_available());
        assert_eq!(pair.history_len(), 6);

        // With the scheduler nominally running, a single remaining source
        // degrades overall health.
        streamer.running.store(true, Ordering::SeqCst);
        let health = streamer.health_check();
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["available_sources"], 1);
        streamer.running.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn all_sources_down_counts_a_failure() {
        let pairs = test_pairs();
        let streamer = test_streamer(pairs.clone(), vec![Arc::new(BrokenSource::new())]);
        let pair = pairs.get_pair("BTCUSDT").unwrap();
        pair.start_streaming();

        assert!(!streamer.collect_pair(&pair).await);
        assert_eq!(pair.error_count(), 1);

        let stats = streamer.stats();
        assert_eq!(stats["summary"]["failed_requests"], 1);
    }

    #[tokio::test]
    async fn duplicate_tick_is_dropped() {
        let pairs = test_pairs();
        let streamer = test_streamer(pairs.clone(), vec![]);
        let pair = pairs.get_pair("BTCUSDT").unwrap();

        let tick = PriceData::from_price_only("BTCUSDT", 45_000.0, 1000.0, "S");
        assert!(pair.add_tick(tick.clone()));

        // Same source and price, inside the 2 s window.
        let mut dup = tick.clone();
        dup.timestamp = tick.timestamp + chrono::Duration::seconds(1);
        assert!(matches!(
            streamer.validate_tick(&pair, &dup),
            Err(TickReject::Duplicate)
        ));

        // Different source: not a duplicate.
        let mut other_source = dup.clone();
        other_source.source = "T".to_string();
        assert!(streamer.validate_tick(&pair, &other_source).is_ok());

        // Same source, outside the window.
        let mut later = tick.clone();
        later.timestamp = tick.timestamp + chrono::Duration::seconds(3);
        assert!(streamer.validate_tick(&pair, &later).is_ok());
    }

    #[tokio::test]
    async fn excessive_jump_is_rejected() {
        let pairs = test_pairs();
        let streamer = test_streamer(pairs.clone(), vec![]);
        let pair = pairs.get_pair("BTCUSDT").unwrap();
        pair.add_tick(PriceData::from_price_only("BTCUSDT", 45_000.0, 1000.0, "S"));

        // +12% move.
        let jump = PriceData::from_price_only("BTCUSDT", 50_400.0, 1000.0, "S");
        assert!(matches!(
            streamer.validate_tick(&pair, &jump),
            Err(TickReject::Invalid(_))
        ));

        // +8% move is accepted.
        let ok = PriceData::from_price_only("BTCUSDT", 48_600.0, 1000.0, "S");
        assert!(streamer.validate_tick(&pair, &ok).is_ok());
    }

    #[tokio::test]
    async fn price_band_enforced_for_configured_pairs() {
        let pairs = Arc::new(PairManager::empty());
        pairs.add_pair(
            "BTCUSDT",
            PairConfig::new("Bitcoin/USDT", true, "#f7931a", "btc")
                .with_price_band(20_000.0, 200_000.0),
        );
        let streamer = test_streamer(pairs.clone(), vec![]);
        let pair = pairs.get_pair("BTCUSDT").unwrap();

        let low = PriceData::from_price_only("BTCUSDT", 15_000.0, 1000.0, "S");
        assert!(matches!(
            streamer.validate_tick(&pair, &low),
            Err(TickReject::Invalid(_))
        ));

        let fine = PriceData::from_price_only("BTCUSDT", 45_000.0, 1000.0, "S");
        assert!(streamer.validate_tick(&pair, &fine).is_ok());
    }

    #[tokio::test]
    async fn pair_level_start_and_stop() {
        let pairs = test_pairs();
        let streamer = test_streamer(pairs.clone(), vec![Arc::new(SimulatedSource::new(0.0))]);

        assert!(streamer.start_pair("BTCUSDT"));
        assert!(pairs.get_pair("BTCUSDT").unwrap().is_streaming());

        assert!(streamer.stop_pair("BTCUSDT"));
        assert!(!streamer.stop_pair("BTCUSDT"), "already stopped");
        assert!(!streamer.start_pair("NOPEUSDT"));
    }
}
