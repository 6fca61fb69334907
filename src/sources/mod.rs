// =============================================================================
// Quote Sources — pluggable providers of periodic price snapshots
// =============================================================================
//
// Every source implements the `QuoteSource` trait: fetch a 24h ticker
// snapshot for one symbol, or report itself unavailable.  Failure handling is
// internal — a source counts its own consecutive errors and takes itself out
// of the rotation after `MAX_SOURCE_ERRORS`, until an operator calls
// `reset_errors`.
//
// Rate limiting is enforced per source across the whole process: callers of
// `fetch` are serialised through a `RateGate` that spaces requests by the
// source's configured minimum interval.
// =============================================================================

pub mod binance;
pub mod coingecko;
pub mod simulated;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::types::PriceData;

pub use binance::ExchangeTickerSource;
pub use coingecko::AggregatorSource;
pub use simulated::SimulatedSource;

/// Consecutive errors after which a source marks itself unavailable.
pub const MAX_SOURCE_ERRORS: u32 = 5;

// =============================================================================
// QuoteSource trait
// =============================================================================

/// A provider of periodic price snapshots for an instrument.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Human-readable source name ("Binance", "CoinGecko", "Simulated").
    fn name(&self) -> &str;

    /// Minimum seconds between consecutive fetches from this source.
    fn rate_limit_secs(&self) -> f64;

    /// Adjust the minimum spacing at runtime.
    fn set_rate_limit_secs(&self, secs: f64);

    /// False once the consecutive-error threshold has been reached.
    fn is_available(&self) -> bool;

    /// Current consecutive-error count.
    fn error_count(&self) -> u32;

    /// Clear the error counter and mark the source available again.
    fn reset_errors(&self);

    /// Fetch a snapshot for `symbol`.  Returns `None` when the source is
    /// unavailable, the symbol is unknown to it, or the request failed —
    /// failures are recorded internally, never surfaced to the caller.
    async fn fetch(&self, symbol: &str) -> Option<PriceData>;
}

// =============================================================================
// SourceHealth — fixed per-source error counter behind a lock
// =============================================================================

#[derive(Debug)]
struct HealthInner {
    error_count: u32,
    available: bool,
}

/// Consecutive-error tracking shared by all source implementations.
#[derive(Debug)]
pub struct SourceHealth {
    name: String,
    inner: Mutex<HealthInner>,
}

impl SourceHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(HealthInner {
                error_count: 0,
                available: true,
            }),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.lock().available
    }

    pub fn error_count(&self) -> u32 {
        self.inner.lock().error_count
    }

    /// Record a successful fetch: clears the counter and restores
    /// availability.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.error_count = 0;
        inner.available = true;
    }

    /// Record a failed fetch.  After `MAX_SOURCE_ERRORS` consecutive
    /// failures the source is taken out of the rotation.
    pub fn record_error(&self, detail: &str) {
        let mut inner = self.inner.lock();
        inner.error_count += 1;
        warn!(source = %self.name, errors = inner.error_count, detail, "source fetch failed");

        if inner.error_count >= MAX_SOURCE_ERRORS && inner.available {
            inner.available = false;
            warn!(
                source = %self.name,
                errors = inner.error_count,
                "source marked unavailable after consecutive errors"
            );
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.error_count = 0;
        inner.available = true;
        info!(source = %self.name, "source errors reset");
    }
}

// =============================================================================
// RateGate — minimum inter-call spacing, per source, process-wide
// =============================================================================

/// Serialises callers so consecutive requests to one source are spaced by at
/// least the configured interval.  Each caller reserves its slot under the
/// lock, then sleeps outside it.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Mutex<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval_secs: f64) -> Self {
        Self {
            min_interval: Mutex::new(Duration::from_secs_f64(min_interval_secs.max(0.0))),
            next_slot: Mutex::new(None),
        }
    }

    pub fn min_interval_secs(&self) -> f64 {
        self.min_interval.lock().as_secs_f64()
    }

    pub fn set_min_interval_secs(&self, secs: f64) {
        *self.min_interval.lock() = Duration::from_secs_f64(secs.max(0.0));
    }

    /// Wait until this caller's reserved slot arrives.
    pub async fn wait(&self) {
        let delay = {
            let interval = *self.min_interval.lock();
            let mut next = self.next_slot.lock();
            let now = Instant::now();

            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + interval);
            slot.saturating_duration_since(now)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Build an HTTP client with the engine's per-call timeout applied.
pub(crate) fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("failed to build reqwest client")
}

/// Parse a JSON value that may be either a string or a number into `f64`.
/// Exchange APIs send numeric fields as JSON strings.
pub(crate) fn parse_str_f64(val: &serde_json::Value, name: &str) -> anyhow::Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .map_err(|e| anyhow::anyhow!("failed to parse {name} '{s}' as f64: {e}"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("field {name} has unexpected JSON type: {val}")
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_marks_unavailable_after_threshold() {
        let health = SourceHealth::new("Test");
        for _ in 0..MAX_SOURCE_ERRORS - 1 {
            health.record_error("boom");
        }
        assert!(health.is_available());

        health.record_error("boom");
        assert!(!health.is_available());
        assert_eq!(health.error_count(), MAX_SOURCE_ERRORS);
    }

    #[test]
    fn health_success_clears_counter() {
        let health = SourceHealth::new("Test");
        health.record_error("boom");
        health.record_error("boom");
        health.record_success();
        assert_eq!(health.error_count(), 0);
        assert!(health.is_available());
    }

    #[test]
    fn health_reset_restores_availability() {
        let health = SourceHealth::new("Test");
        for _ in 0..MAX_SOURCE_ERRORS {
            health.record_error("boom");
        }
        assert!(!health.is_available());
        health.reset();
        assert!(health.is_available());
    }

    #[tokio::test]
    async fn rate_gate_spaces_consecutive_calls() {
        let gate = RateGate::new(0.05);
        let start = Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        // Two full intervals must elapse between the first and third call.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn rate_gate_zero_interval_never_sleeps() {
        let gate = RateGate::new(0.0);
        let start = Instant::now();
        for _ in 0..10 {
            gate.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn parse_str_f64_accepts_strings_and_numbers() {
        assert_eq!(
            parse_str_f64(&serde_json::json!("45000.5"), "lastPrice").unwrap(),
            45000.5
        );
        assert_eq!(parse_str_f64(&serde_json::json!(42.0), "price").unwrap(), 42.0);
        assert!(parse_str_f64(&serde_json::json!(null), "price").is_err());
    }
}
