// =============================================================================
// Exchange Ticker Source — 24h ticker REST endpoint
// =============================================================================
//
// Consumes `GET /api/v3/ticker/24hr?symbol=<SYM>` and maps the response into
// a tick.  All numeric fields arrive as JSON strings.
// =============================================================================

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::sources::{build_http_client, parse_str_f64, QuoteSource, RateGate, SourceHealth};
use crate::types::PriceData;

const SOURCE_NAME: &str = "Binance";
const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Quote source backed by a Binance-style 24h ticker endpoint.
pub struct ExchangeTickerSource {
    base_url: String,
    client: reqwest::Client,
    health: SourceHealth,
    gate: RateGate,
}

impl ExchangeTickerSource {
    pub fn new(rate_limit_secs: f64, timeout_secs: u64) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, rate_limit_secs, timeout_secs)
    }

    /// Construct against a custom base URL (tests point this at a local stub).
    pub fn with_base_url(base_url: &str, rate_limit_secs: f64, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_http_client(timeout_secs),
            health: SourceHealth::new(SOURCE_NAME),
            gate: RateGate::new(rate_limit_secs),
        }
    }

    async fn fetch_ticker(&self, symbol: &str) -> anyhow::Result<PriceData> {
        let url = format!("{}/api/v3/ticker/24hr?symbol={}", self.base_url, symbol);

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("ticker endpoint returned {status}");
        }

        let body: serde_json::Value = resp.json().await?;

        let last_price = parse_str_f64(&body["lastPrice"], "lastPrice")?;
        let open = parse_str_f64(&body["openPrice"], "openPrice")?;
        let high = parse_str_f64(&body["highPrice"], "highPrice")?;
        let low = parse_str_f64(&body["lowPrice"], "lowPrice")?;
        let volume = parse_str_f64(&body["volume"], "volume")?;
        // Present in every 24h ticker payload; parsed to validate the schema
        // even though the tick itself carries no change field.
        let _change_pct = parse_str_f64(&body["priceChangePercent"], "priceChangePercent")?;

        Ok(PriceData {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            price: last_price,
            open,
            high,
            low,
            close: last_price,
            volume,
            source: SOURCE_NAME.to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for ExchangeTickerSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn rate_limit_secs(&self) -> f64 {
        self.gate.min_interval_secs()
    }

    fn set_rate_limit_secs(&self, secs: f64) {
        self.gate.set_min_interval_secs(secs);
    }

    fn is_available(&self) -> bool {
        self.health.is_available()
    }

    fn error_count(&self) -> u32 {
        self.health.error_count()
    }

    fn reset_errors(&self) {
        self.health.reset();
    }

    async fn fetch(&self, symbol: &str) -> Option<PriceData> {
        if !self.is_available() {
            return None;
        }

        self.gate.wait().await;

        match self.fetch_ticker(symbol).await {
            Ok(tick) => {
                self.health.record_success();
                debug!(symbol, price = tick.price, "exchange ticker fetched");
                Some(tick)
            }
            Err(e) => {
                self.health.record_error(&e.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_source_returns_none_without_request() {
        // Unroutable base URL: if availability gating failed, the request
        // itself would error and bump the counter.
        let source = ExchangeTickerSource::with_base_url("http://127.0.0.1:1", 0.0, 1);
        for _ in 0..crate::sources::MAX_SOURCE_ERRORS {
            source.health.record_error("seeded");
        }
        assert!(!source.is_available());

        let before = source.error_count();
        assert!(source.fetch("BTCUSDT").await.is_none());
        assert_eq!(source.error_count(), before);
    }

    #[tokio::test]
    async fn failed_request_increments_error_count() {
        let source = ExchangeTickerSource::with_base_url("http://127.0.0.1:1", 0.0, 1);
        assert!(source.fetch("BTCUSDT").await.is_none());
        assert_eq!(source.error_count(), 1);
        assert!(source.is_available());
    }

    #[test]
    fn reports_identity() {
        let source = ExchangeTickerSource::new(0.5, 10);
        assert_eq!(source.name(), "Binance");
        assert!((source.rate_limit_secs() - 0.5).abs() < f64::EPSILON);
    }
}
