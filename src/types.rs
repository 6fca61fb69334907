// =============================================================================
// Shared types used across the Meridian signal engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single point-in-time price snapshot with OHLC and volume fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Name of the quote source that produced this tick.
    pub source: String,
}

impl PriceData {
    /// Build a tick where OHLC fields default to `price` when a provider
    /// does not supply them (aggregator-style sources).
    pub fn from_price_only(symbol: &str, price: f64, volume: f64, source: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            price,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            source: source.to_string(),
        }
    }
}

/// Lifecycle status of a trading pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairStatus {
    Enabled,
    Disabled,
    /// Unrecoverable initialization failure.
    Error,
    /// Too many consecutive errors; requires an explicit reset.
    Maintenance,
}

impl std::fmt::Display for PairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Error => write!(f, "error"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Generic response envelope returned by every `TradingSystem` operation.
///
/// Mirrors the shape consumed by external collaborators:
/// `{success, message?, data?, error?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_only_tick_repeats_price_in_ohlc() {
        let tick = PriceData::from_price_only("BTCUSDT", 45000.0, 1000.0, "CoinGecko");
        assert_eq!(tick.open, 45000.0);
        assert_eq!(tick.high, 45000.0);
        assert_eq!(tick.low, 45000.0);
        assert_eq!(tick.close, 45000.0);
        assert_eq!(tick.source, "CoinGecko");
    }

    #[test]
    fn pair_status_display() {
        assert_eq!(PairStatus::Maintenance.to_string(), "maintenance");
        assert_eq!(PairStatus::Enabled.to_string(), "enabled");
    }

    #[test]
    fn api_response_serializes_without_empty_fields() {
        let json = serde_json::to_value(ApiResponse::ok("started")).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
    }
}
