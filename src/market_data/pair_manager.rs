// =============================================================================
// PairManager — central registry of trading pairs
// =============================================================================
//
// Owns the pair table, seeds the default instrument set and centralises
// batch operations (enable/disable all, streaming control, error resets,
// aggregate summaries) plus metadata export/import.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::market_data::pair::{PairConfig, PairConfigUpdate, TradingPair};
use crate::types::PairStatus;

pub struct PairManager {
    pairs: RwLock<HashMap<String, Arc<TradingPair>>>,
}

impl PairManager {
    /// Create a manager seeded with the default instrument set.
    pub fn new() -> Self {
        let manager = Self {
            pairs: RwLock::new(HashMap::new()),
        };
        manager.initialize_default_pairs();
        manager
    }

    /// Create an empty manager (tests build their own pair set).
    pub fn empty() -> Self {
        Self {
            pairs: RwLock::new(HashMap::new()),
        }
    }

    fn initialize_default_pairs(&self) {
        // BTC carries the hard price validation band; the remaining pairs
        // are unbounded.
        self.add_pair(
            "BTCUSDT",
            PairConfig::new("Bitcoin/USDT", true, "#f7931a", "fab fa-bitcoin")
                .with_price_band(20_000.0, 200_000.0),
        );
        self.add_pair(
            "ETHUSDT",
            PairConfig::new("Ethereum/USDT", true, "#627eea", "fab fa-ethereum"),
        );
        self.add_pair(
            "SOLUSDT",
            PairConfig::new("Solana/USDT", false, "#9945ff", "fas fa-sun"),
        );
        self.add_pair(
            "BNBUSDT",
            PairConfig::new("BNB/USDT", false, "#f3ba2f", "fas fa-coins"),
        );
        self.add_pair(
            "ADAUSDT",
            PairConfig::new("Cardano/USDT", false, "#0033ad", "fas fa-heart"),
        );
        self.add_pair(
            "DOTUSDT",
            PairConfig::new("Polkadot/USDT", false, "#e6007a", "fas fa-circle"),
        );
        self.add_pair(
            "LINKUSDT",
            PairConfig::new("Chainlink/USDT", false, "#2a5ada", "fas fa-link"),
        );

        info!(count = self.pairs.read().len(), "default pairs initialised");
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    /// Register a pair, or update metadata when the symbol already exists.
    pub fn add_pair(&self, symbol: &str, config: PairConfig) -> Arc<TradingPair> {
        let symbol = symbol.to_uppercase();
        let mut pairs = self.pairs.write();

        if let Some(existing) = pairs.get(&symbol) {
            warn!(symbol = %symbol, "pair already exists — updating metadata");
            existing.update_config(&PairConfigUpdate {
                display_name: Some(config.display_name),
                enabled: Some(config.enabled),
                color: Some(config.color),
                icon: Some(config.icon),
                ..Default::default()
            });
            return existing.clone();
        }

        let pair = Arc::new(TradingPair::new(&symbol, config));
        pairs.insert(symbol.clone(), pair.clone());
        info!(symbol = %symbol, "pair added");
        pair
    }

    pub fn remove_pair(&self, symbol: &str) -> bool {
        let symbol = symbol.to_uppercase();
        let mut pairs = self.pairs.write();

        match pairs.remove(&symbol) {
            Some(pair) => {
                pair.stop_streaming();
                info!(symbol = %symbol, "pair removed");
                true
            }
            None => {
                warn!(symbol = %symbol, "cannot remove unknown pair");
                false
            }
        }
    }

    pub fn get_pair(&self, symbol: &str) -> Option<Arc<TradingPair>> {
        self.pairs.read().get(&symbol.to_uppercase()).cloned()
    }

    /// All pairs sorted by symbol for stable output.
    pub fn all_pairs(&self) -> Vec<Arc<TradingPair>> {
        let mut pairs: Vec<_> = self.pairs.read().values().cloned().collect();
        pairs.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        pairs
    }

    pub fn enabled_pairs(&self) -> Vec<Arc<TradingPair>> {
        self.all_pairs().into_iter().filter(|p| p.is_enabled()).collect()
    }

    pub fn streaming_pairs(&self) -> Vec<Arc<TradingPair>> {
        self.all_pairs().into_iter().filter(|p| p.is_streaming()).collect()
    }

    // -------------------------------------------------------------------------
    // Batch operations
    // -------------------------------------------------------------------------

    pub fn enable_all(&self) {
        for pair in self.all_pairs() {
            pair.enable();
        }
        info!("all pairs enabled");
    }

    pub fn disable_all(&self) {
        for pair in self.all_pairs() {
            pair.disable();
        }
        info!("all pairs disabled");
    }

    /// Start streaming on every enabled pair; returns the count started.
    pub fn start_all_streaming(&self) -> usize {
        let count = self
            .enabled_pairs()
            .into_iter()
            .filter(|p| p.start_streaming())
            .count();
        info!(count, "streaming started for enabled pairs");
        count
    }

    pub fn stop_all_streaming(&self) {
        let streaming = self.streaming_pairs();
        for pair in &streaming {
            pair.stop_streaming();
        }
        info!(count = streaming.len(), "streaming stopped for all pairs");
    }

    pub fn reset_all_errors(&self) {
        for pair in self.all_pairs() {
            pair.reset_errors();
        }
        info!("errors reset for all pairs");
    }

    pub fn update_pair_config(&self, symbol: &str, update: &PairConfigUpdate) -> bool {
        match self.get_pair(symbol) {
            Some(pair) => {
                pair.update_config(update);
                true
            }
            None => {
                warn!(symbol, "cannot update config of unknown pair");
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    pub fn summary(&self) -> serde_json::Value {
        let pairs = self.all_pairs();
        let enabled = pairs.iter().filter(|p| p.is_enabled()).count();
        let streaming = pairs.iter().filter(|p| p.is_streaming()).count();
        let healthy = pairs.iter().filter(|p| p.is_streaming_healthy()).count();
        let in_error = pairs.iter().filter(|p| p.error_count() > 0).count();
        let total_points: usize = pairs.iter().map(|p| p.history_len()).sum();

        serde_json::json!({
            "total_pairs": pairs.len(),
            "enabled_pairs": enabled,
            "streaming_pairs": streaming,
            "healthy_pairs": healthy,
            "pairs_in_error": in_error,
            "total_data_points": total_points,
        })
    }

    pub fn health_report(&self) -> serde_json::Value {
        let mut healthy = Vec::new();
        let mut unhealthy = Vec::new();
        let mut maintenance = Vec::new();

        for pair in self.all_pairs() {
            let symbol = pair.symbol().to_string();
            if pair.status() == PairStatus::Maintenance {
                maintenance.push(symbol);
            } else if pair.is_streaming_healthy() {
                healthy.push(symbol);
            } else {
                unhealthy.push(symbol);
            }
        }

        let overall = if unhealthy.is_empty() { "healthy" } else { "degraded" };

        serde_json::json!({
            "healthy_pairs": healthy,
            "unhealthy_pairs": unhealthy,
            "maintenance_pairs": maintenance,
            "overall_health": overall,
        })
    }

    // -------------------------------------------------------------------------
    // Metadata export / import
    // -------------------------------------------------------------------------

    /// Export pair metadata; `import_config(export_config())` is idempotent.
    pub fn export_config(&self) -> serde_json::Value {
        let mut pairs = serde_json::Map::new();
        for pair in self.all_pairs() {
            let cfg = pair.config();
            pairs.insert(
                pair.symbol().to_string(),
                serde_json::json!({
                    "display_name": cfg.display_name,
                    "enabled": cfg.enabled,
                    "color": cfg.color,
                    "icon": cfg.icon,
                    "update_interval_secs": cfg.update_interval_secs,
                    "max_errors": cfg.max_errors,
                    "retry_delay_secs": cfg.retry_delay_secs,
                }),
            );
        }

        serde_json::json!({
            "pairs": pairs,
            "exported_at": Utc::now().to_rfc3339(),
            "total_pairs": self.pairs.read().len(),
        })
    }

    pub fn import_config(&self, config: &serde_json::Value) -> bool {
        let Some(pairs) = config.get("pairs").and_then(|p| p.as_object()) else {
            warn!("import config missing 'pairs' object");
            return false;
        };

        for (symbol, entry) in pairs {
            let display_name = entry
                .get("display_name")
                .and_then(|v| v.as_str())
                .unwrap_or(symbol)
                .to_string();
            let enabled = entry.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true);
            let color = entry
                .get("color")
                .and_then(|v| v.as_str())
                .unwrap_or("#007bff")
                .to_string();
            let icon = entry
                .get("icon")
                .and_then(|v| v.as_str())
                .unwrap_or("fas fa-coins")
                .to_string();

            let pair = self.add_pair(symbol, PairConfig::new(&display_name, enabled, &color, &icon));

            pair.update_config(&PairConfigUpdate {
                update_interval_secs: entry.get("update_interval_secs").and_then(|v| v.as_u64()),
                max_errors: entry
                    .get("max_errors")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
                retry_delay_secs: entry.get("retry_delay_secs").and_then(|v| v.as_u64()),
                ..Default::default()
            });
        }

        info!(count = pairs.len(), "pair configuration imported");
        true
    }
}

impl Default for PairManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_has_two_enabled_pairs() {
        let manager = PairManager::new();
        assert_eq!(manager.all_pairs().len(), 7);

        let enabled: Vec<String> = manager
            .enabled_pairs()
            .iter()
            .map(|p| p.symbol().to_string())
            .collect();
        assert_eq!(enabled, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn btc_carries_price_band_others_do_not() {
        let manager = PairManager::new();
        let btc = manager.get_pair("BTCUSDT").unwrap();
        assert_eq!(btc.price_band(), Some((20_000.0, 200_000.0)));

        let eth = manager.get_pair("ETHUSDT").unwrap();
        assert_eq!(eth.price_band(), None);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let manager = PairManager::new();
        assert!(manager.get_pair("btcusdt").is_some());
    }

    #[test]
    fn adding_existing_pair_updates_metadata() {
        let manager = PairManager::new();
        manager.add_pair(
            "BTCUSDT",
            PairConfig::new("Bitcoin Prime", true, "#000000", "btc"),
        );

        assert_eq!(manager.all_pairs().len(), 7);
        let btc = manager.get_pair("BTCUSDT").unwrap();
        assert_eq!(btc.config().display_name, "Bitcoin Prime");
        // Price band survives a metadata refresh.
        assert_eq!(btc.price_band(), Some((20_000.0, 200_000.0)));
    }

    #[test]
    fn start_all_streaming_counts_enabled_only() {
        let manager = PairManager::new();
        assert_eq!(manager.start_all_streaming(), 2);
        assert_eq!(manager.streaming_pairs().len(), 2);

        manager.stop_all_streaming();
        assert!(manager.streaming_pairs().is_empty());
    }

    #[test]
    fn remove_pair_stops_streaming() {
        let manager = PairManager::new();
        manager.start_all_streaming();
        assert!(manager.remove_pair("BTCUSDT"));
        assert!(manager.get_pair("BTCUSDT").is_none());
        assert!(!manager.remove_pair("BTCUSDT"));
    }

    #[test]
    fn export_import_round_trip_is_idempotent() {
        let manager = PairManager::new();
        manager.update_pair_config(
            "ETHUSDT",
            &PairConfigUpdate {
                update_interval_secs: Some(11),
                ..Default::default()
            },
        );

        let exported = manager.export_config();
        assert!(manager.import_config(&exported));

        let reexported = manager.export_config();
        assert_eq!(exported["pairs"], reexported["pairs"]);

        let eth = manager.get_pair("ETHUSDT").unwrap();
        assert_eq!(eth.config().update_interval_secs, 11);
    }

    #[test]
    fn enable_and_disable_all() {
        let manager = PairManager::new();
        manager.enable_all();
        assert_eq!(manager.enabled_pairs().len(), 7);

        manager.disable_all();
        assert!(manager.enabled_pairs().is_empty());
        assert_eq!(manager.start_all_streaming(), 0);
    }

    #[test]
    fn summary_aggregates_counts() {
        let manager = PairManager::new();
        manager.start_all_streaming();
        let summary = manager.summary();
        assert_eq!(summary["total_pairs"], 7);
        assert_eq!(summary["enabled_pairs"], 2);
        assert_eq!(summary["streaming_pairs"], 2);
    }
}
