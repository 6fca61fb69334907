// =============================================================================
// Aggregator Source — CoinGecko-style simple-price endpoint
// =============================================================================
//
// The aggregator serves prices keyed by coin id rather than exchange symbol,
// so a static symbol→id map is required.  OHLC fields are not provided and
// are filled by repeating the spot price.
// =============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::sources::{build_http_client, QuoteSource, RateGate, SourceHealth};
use crate::types::PriceData;

const SOURCE_NAME: &str = "CoinGecko";
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";

fn default_symbol_map() -> HashMap<String, String> {
    [
        ("BTCUSDT", "bitcoin"),
        ("ETHUSDT", "ethereum"),
        ("SOLUSDT", "solana"),
        ("BNBUSDT", "binancecoin"),
        ("ADAUSDT", "cardano"),
        ("DOTUSDT", "polkadot"),
        ("LINKUSDT", "chainlink"),
    ]
    .into_iter()
    .map(|(sym, id)| (sym.to_string(), id.to_string()))
    .collect()
}

/// Quote source backed by a CoinGecko-style aggregator.
pub struct AggregatorSource {
    base_url: String,
    client: reqwest::Client,
    health: SourceHealth,
    gate: RateGate,
    symbol_map: HashMap<String, String>,
}

impl AggregatorSource {
    pub fn new(rate_limit_secs: f64, timeout_secs: u64) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, rate_limit_secs, timeout_secs)
    }

    pub fn with_base_url(base_url: &str, rate_limit_secs: f64, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_http_client(timeout_secs),
            health: SourceHealth::new(SOURCE_NAME),
            gate: RateGate::new(rate_limit_secs),
            symbol_map: default_symbol_map(),
        }
    }

    async fn fetch_simple_price(&self, symbol: &str, coin_id: &str) -> anyhow::Result<PriceData> {
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true&include_market_cap=true",
            self.base_url, coin_id
        );

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("simple-price endpoint returned {status}");
        }

        let body: serde_json::Value = resp.json().await?;
        let coin = body
            .get(coin_id)
            .ok_or_else(|| anyhow::anyhow!("coin id {coin_id} missing from response"))?;

        let price = coin["usd"]
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("usd price missing for {coin_id}"))?;
        let volume = coin.get("usd_24h_vol").and_then(|v| v.as_f64()).unwrap_or(0.0);

        Ok(PriceData::from_price_only(symbol, price, volume, SOURCE_NAME))
    }
}

#[async_trait]
impl QuoteSource for AggregatorSource {
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

        let Some(coin_id) = self.symbol_map.get(symbol) else {
            // Unknown symbols are a mapping gap, not a source failure.
            warn!(symbol, "symbol not mapped for aggregator source");
            return None;
        };

        self.gate.wait().await;

        match self.fetch_simple_price(symbol, coin_id).await {
            Ok(tick) => {
                self.health.record_success();
                debug!(symbol, price = tick.price, "aggregator price fetched");
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
    async fn unmapped_symbol_is_not_a_source_error() {
        let source = AggregatorSource::with_base_url("http://127.0.0.1:1", 0.0, 1);
        assert!(source.fetch("XYZUSDT").await.is_none());
        assert_eq!(source.error_count(), 0);
        assert!(source.is_available());
    }

    #[tokio::test]
    async fn failed_request_increments_error_count() {
        let source = AggregatorSource::with_base_url("http://127.0.0.1:1", 0.0, 1);
        assert!(source.fetch("BTCUSDT").await.is_none());
        assert_eq!(source.error_count(), 1);
    }

    #[test]
    fn symbol_map_covers_default_pairs() {
        let map = default_symbol_map();
        assert_eq!(map.get("BTCUSDT").unwrap(), "bitcoin");
        assert_eq!(map.get("LINKUSDT").unwrap(), "chainlink");
        assert_eq!(map.len(), 7);
    }
}
