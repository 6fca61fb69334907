// =============================================================================
// Simulated Source — deterministic random-walk fallback
// =============================================================================
//
// Produces ticks as a ±2% random walk around per-symbol base prices.  Always
// available, so it terminates every failover chain when enabled.
// =============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

use crate::sources::{QuoteSource, RateGate, SourceHealth};
use crate::types::PriceData;

const SOURCE_NAME: &str = "Simulated";

fn base_prices() -> HashMap<String, f64> {
    [
        ("BTCUSDT", 45_000.0),
        ("ETHUSDT", 3_000.0),
        ("SOLUSDT", 100.0),
        ("BNBUSDT", 300.0),
        ("ADAUSDT", 0.5),
        ("DOTUSDT", 6.0),
        ("LINKUSDT", 15.0),
    ]
    .into_iter()
    .map(|(sym, p)| (sym.to_string(), p))
    .collect()
}

/// Always-available fallback source generating random-walk ticks.
pub struct SimulatedSource {
    health: SourceHealth,
    gate: RateGate,
    base: HashMap<String, f64>,
    last_prices: Mutex<HashMap<String, f64>>,
}

impl SimulatedSource {
    pub fn new(rate_limit_secs: f64) -> Self {
        let base = base_prices();
        Self {
            health: SourceHealth::new(SOURCE_NAME),
            gate: RateGate::new(rate_limit_secs),
            last_prices: Mutex::new(base.clone()),
            base,
        }
    }

}

#[async_trait]
impl QuoteSource for SimulatedSource {
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
        let base_price = *self.base.get(symbol)?;

        self.gate.wait().await;

        let (open, new_price, high, low, volume) = {
            let mut rng = rand::thread_rng();
            let mut last = self.last_prices.lock();
            let prev = *last.get(symbol).unwrap_or(&base_price);

            let variation: f64 = rng.gen_range(-0.02..0.02);
            let new_price = prev * (1.0 + variation);
            last.insert(symbol.to_string(), new_price);

            let high = new_price * rng.gen_range(1.0..1.01);
            let low = new_price * rng.gen_range(0.99..1.0);
            let volume = rng.gen_range(1_000_000.0..5_000_000.0);

            (prev, new_price, high, low, volume)
        };

        debug!(symbol, price = new_price, "simulated tick generated");

        Some(PriceData {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            price: new_price,
            open,
            high,
            low,
            close: new_price,
            volume,
            source: SOURCE_NAME.to_string(),
        })
    }
}
