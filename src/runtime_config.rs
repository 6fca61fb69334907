// =============================================================================
// Runtime Configuration — Hot-reloadable engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Meridian signal engine.  Every tunable
// parameter lives here so that the engine can be reconfigured at runtime
// without a restart.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.  Environment variables override
// file values at load time.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_update_interval_secs() -> u64 {
    5
}

fn default_max_workers() -> usize {
    5
}

fn default_connection_timeout_secs() -> u64 {
    10
}

fn default_rate_limit_binance() -> f64 {
    0.5
}

fn default_rate_limit_coingecko() -> f64 {
    1.0
}

fn default_rate_limit_simulated() -> f64 {
    0.1
}

fn default_max_concurrent_signals() -> usize {
    10
}

fn default_stop_loss_pct() -> f64 {
    2.0
}

fn default_take_profit_pct() -> f64 {
    4.0
}

fn default_signal_expiry_hours() -> i64 {
    24
}

fn default_min_confidence_threshold() -> f64 {
    0.5
}

fn default_db_path() -> String {
    "data/trading_system.db".to_string()
}

fn default_cleanup_days() -> u32 {
    30
}

fn default_history_days() -> u32 {
    7
}

// =============================================================================
// StreamingConfig
// =============================================================================

/// Tunable parameters for the ingestion scheduler and its quote sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Seconds between collection cycles (minimum 1).
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Worker-pool size for parallel per-pair fetches (1..=20).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-HTTP-call timeout in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Minimum seconds between consecutive calls to the exchange ticker API.
    #[serde(default = "default_rate_limit_binance")]
    pub rate_limit_binance: f64,

    /// Minimum seconds between consecutive calls to the aggregator API.
    #[serde(default = "default_rate_limit_coingecko")]
    pub rate_limit_coingecko: f64,

    /// Minimum seconds between simulated-source reads.
    #[serde(default = "default_rate_limit_simulated")]
    pub rate_limit_simulated: f64,

    /// Include the simulated source at the end of the failover chain.
    #[serde(default = "default_true")]
    pub fallback_to_simulated: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            max_workers: default_max_workers(),
            connection_timeout_secs: default_connection_timeout_secs(),
            rate_limit_binance: default_rate_limit_binance(),
            rate_limit_coingecko: default_rate_limit_coingecko(),
            rate_limit_simulated: default_rate_limit_simulated(),
            fallback_to_simulated: default_true(),
        }
    }
}

// =============================================================================
// TradingConfig
// =============================================================================

/// Tunable parameters for signal creation and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Hard cap on simultaneously active signals.
    #[serde(default = "default_max_concurrent_signals")]
    pub max_concurrent_signals: usize,

    /// Default stop-loss distance (percent of entry) for manual signals.
    #[serde(default = "default_stop_loss_pct")]
    pub default_stop_loss_pct: f64,

    /// Default take-profit distance (percent of entry) for manual signals.
    #[serde(default = "default_take_profit_pct")]
    pub default_take_profit_pct: f64,

    /// Hours before an unactivated signal expires.
    #[serde(default = "default_signal_expiry_hours")]
    pub signal_expiry_hours: i64,

    /// Floor on candidate confidence, expressed in 0..1.
    #[serde(default = "default_min_confidence_threshold")]
    pub min_confidence_threshold: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_signals: default_max_concurrent_signals(),
            default_stop_loss_pct: default_stop_loss_pct(),
            default_take_profit_pct: default_take_profit_pct(),
            signal_expiry_hours: default_signal_expiry_hours(),
            min_confidence_threshold: default_min_confidence_threshold(),
        }
    }
}

// =============================================================================
// DatabaseConfig / AnalyticsConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Location of the embedded database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Retention window for price data, indicators and logs (days, >= 1).
    #[serde(default = "default_cleanup_days")]
    pub cleanup_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            cleanup_days: default_cleanup_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// History window offered to reporting consumers (days).
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub trading: TradingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            streaming: StreamingConfig::default(),
            trading: TradingConfig::default(),
            database: DatabaseConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`, then apply environment
    /// overrides and clamp values into their valid ranges.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config.apply_env_overrides();
        config.clamp();

        info!(
            path = %path.display(),
            update_interval = config.streaming.update_interval_secs,
            max_workers = config.streaming.max_workers,
            db_path = %config.database.path,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply environment-variable overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("STREAMING_INTERVAL") {
            self.streaming.update_interval_secs = v;
        }
        if let Some(v) = env_parse::<usize>("STREAMING_MAX_WORKERS") {
            self.streaming.max_workers = v;
        }
        if let Some(v) = env_parse::<u64>("STREAMING_TIMEOUT") {
            self.streaming.connection_timeout_secs = v;
        }
        if let Some(v) = env_parse::<f64>("RATE_LIMIT_BINANCE") {
            self.streaming.rate_limit_binance = v;
        }
        if let Some(v) = env_parse::<f64>("RATE_LIMIT_COINGECKO") {
            self.streaming.rate_limit_coingecko = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_CONCURRENT_SIGNALS") {
            self.trading.max_concurrent_signals = v;
        }
        if let Some(v) = env_parse::<f64>("DEFAULT_STOP_LOSS") {
            self.trading.default_stop_loss_pct = v;
        }
        if let Some(v) = env_parse::<f64>("DEFAULT_TAKE_PROFIT") {
            self.trading.default_take_profit_pct = v;
        }
        if let Ok(v) = std::env::var("DATABASE_PATH") {
            if !v.trim().is_empty() {
                self.database.path = v;
            }
        }
        if let Some(v) = env_parse::<u32>("DB_CLEANUP_DAYS") {
            self.database.cleanup_days = v;
        }
    }

    /// Clamp values into the ranges the engine supports.
    pub fn clamp(&mut self) {
        self.streaming.update_interval_secs = self.streaming.update_interval_secs.max(1);
        self.streaming.max_workers = self.streaming.max_workers.clamp(1, 20);
        self.streaming.connection_timeout_secs =
            self.streaming.connection_timeout_secs.clamp(1, 120);
        self.streaming.rate_limit_binance = self.streaming.rate_limit_binance.max(0.1);
        self.streaming.rate_limit_coingecko = self.streaming.rate_limit_coingecko.max(0.1);
        self.streaming.rate_limit_simulated = self.streaming.rate_limit_simulated.max(0.1);
        self.trading.max_concurrent_signals = self.trading.max_concurrent_signals.max(1);
        self.trading.min_confidence_threshold =
            self.trading.min_confidence_threshold.clamp(0.0, 1.0);
        self.database.cleanup_days = self.database.cleanup_days.max(1);
        if self.trading.signal_expiry_hours < 1 {
            warn!(
                hours = self.trading.signal_expiry_hours,
                "signal expiry below 1h — resetting to default"
            );
            self.trading.signal_expiry_hours = default_signal_expiry_hours();
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
