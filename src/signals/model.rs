// =============================================================================
// Signal Model — advisory trade setups and their lifecycle states
// =============================================================================
//
// A signal is identified by the first 12 hex chars of the MD5 digest over
// `pattern|entry|target|stop|currentPrice` with all prices rounded to two
// decimals.  The truncated-MD5 identity is load-bearing: it must stay
// reproducible across implementations.
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pattern types
// ---------------------------------------------------------------------------

/// Origin pattern of a signal, which also fixes its trading direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternType {
    DoubleBottom,
    HeadAndShoulders,
    TriangleBreakoutUp,
    TriangleBreakoutDown,
    IndicatorsBuy,
    IndicatorsSell,
    ManualBuy,
    ManualSell,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoubleBottom => "DOUBLE_BOTTOM",
            Self::HeadAndShoulders => "HEAD_AND_SHOULDERS",
            Self::TriangleBreakoutUp => "TRIANGLE_BREAKOUT_UP",
            Self::TriangleBreakoutDown => "TRIANGLE_BREAKOUT_DOWN",
            Self::IndicatorsBuy => "INDICATORS_BUY",
            Self::IndicatorsSell => "INDICATORS_SELL",
            Self::ManualBuy => "MANUAL_BUY",
            Self::ManualSell => "MANUAL_SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DOUBLE_BOTTOM" => Some(Self::DoubleBottom),
            "HEAD_AND_SHOULDERS" => Some(Self::HeadAndShoulders),
            "TRIANGLE_BREAKOUT_UP" => Some(Self::TriangleBreakoutUp),
            "TRIANGLE_BREAKOUT_DOWN" => Some(Self::TriangleBreakoutDown),
            "INDICATORS_BUY" => Some(Self::IndicatorsBuy),
            "INDICATORS_SELL" => Some(Self::IndicatorsSell),
            "MANUAL_BUY" => Some(Self::ManualBuy),
            "MANUAL_SELL" => Some(Self::ManualSell),
            _ => None,
        }
    }

    /// Bullish patterns require `target > entry > stop`; bearish the reverse.
    pub fn is_bullish(&self) -> bool {
        matches!(
            self,
            Self::DoubleBottom | Self::TriangleBreakoutUp | Self::IndicatorsBuy | Self::ManualBuy
        )
    }

    /// Post-emission interval during which this pattern is not re-emitted.
    pub fn cooldown(&self) -> Duration {
        match self {
            Self::DoubleBottom => Duration::hours(4),
            Self::HeadAndShoulders => Duration::hours(6),
            Self::TriangleBreakoutUp | Self::TriangleBreakoutDown => Duration::hours(2),
            Self::IndicatorsBuy | Self::IndicatorsSell => Duration::minutes(30),
            _ => Duration::hours(1),
        }
    }

    /// "BUY" or "SELL" as stored in the `signal_type` column.
    pub fn signal_type(&self) -> &'static str {
        if self.is_bullish() {
            "BUY"
        } else {
            "SELL"
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Active,
    HitTarget,
    HitStop,
    Expired,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::HitTarget => "HIT_TARGET",
            Self::HitStop => "HIT_STOP",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "HIT_TARGET" => Some(Self::HitTarget),
            "HIT_STOP" => Some(Self::HitStop),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != Self::Active
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Candidate and Signal
// ---------------------------------------------------------------------------

/// A candidate trade setup produced by a pattern detector, before any
/// validation, uniqueness or cooldown checks have run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternCandidate {
    pub pattern: PatternType,
    pub entry: f64,
    pub target: f64,
    pub stop: f64,
    /// 0..=100.
    pub confidence: f64,
}

/// The central lifecycle entity: an advisory signal with explicit
/// entry/target/stop parameters tracked from creation to resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// 12-hex-char truncated MD5 identity — the uniqueness key.
    pub signal_id: String,
    pub symbol: String,
    pub pattern: PatternType,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    /// 0..=100.
    pub confidence: f64,
    /// `|target-entry| / |entry-stop|` at creation time.
    pub risk_reward: f64,
    pub status: SignalStatus,
    /// Latched true once price first crosses entry; never unlatched.
    pub activated: bool,
    pub current_price: f64,
    pub profit_loss_pct: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Signal {
    /// Build a fresh ACTIVE signal from a validated candidate.
    pub fn from_candidate(symbol: &str, candidate: &PatternCandidate, current_price: f64) -> Self {
        let now = Utc::now();
        Self {
            signal_id: signal_hash(
                candidate.pattern.as_str(),
                candidate.entry,
                candidate.target,
                candidate.stop,
                current_price,
            ),
            symbol: symbol.to_string(),
            pattern: candidate.pattern,
            entry_price: candidate.entry,
            target_price: candidate.target,
            stop_loss: candidate.stop,
            confidence: candidate.confidence,
            risk_reward: risk_reward(candidate.entry, candidate.target, candidate.stop),
            status: SignalStatus::Active,
            activated: false,
            current_price,
            profit_loss_pct: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            close_reason: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.pattern.is_bullish()
    }

    pub fn signal_type(&self) -> &'static str {
        self.pattern.signal_type()
    }
}

// ---------------------------------------------------------------------------
// Identity hash and ratios
// ---------------------------------------------------------------------------

/// First 12 hex chars of MD5 over `pattern|entry|target|stop|currentPrice`
/// with all prices rounded to two decimals.
pub fn signal_hash(pattern: &str, entry: f64, target: f64, stop: f64, current_price: f64) -> String {
    let payload = format!(
        "{}|{:.2}|{:.2}|{:.2}|{:.2}",
        pattern, entry, target, stop, current_price
    );

    let mut hasher = Md5::new();
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();

    hex::encode(digest)[..12].to_string()
}

/// `|target-entry| / |entry-stop|`; infinite risk distance yields 0.
pub fn risk_reward(entry: f64, target: f64, stop: f64) -> f64 {
    let risk = (entry - stop).abs();
    if risk == 0.0 {
        return 0.0;
    }
    (target - entry).abs() / risk
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_twelve_lowercase_hex_chars() {
        let hash = signal_hash("DOUBLE_BOTTOM", 43344.0, 44144.0, 42355.0, 43400.0);
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_is_stable_for_equal_inputs() {
        let a = signal_hash("INDICATORS_BUY", 100.0, 110.0, 97.0, 100.5);
        let b = signal_hash("INDICATORS_BUY", 100.0, 110.0, 97.0, 100.5);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_rounds_prices_to_two_decimals() {
        // Sub-cent differences collapse to the same identity.
        let a = signal_hash("INDICATORS_BUY", 100.001, 110.0, 97.0, 100.5);
        let b = signal_hash("INDICATORS_BUY", 100.004, 110.0, 97.0, 100.5);
        assert_eq!(a, b);

        let c = signal_hash("INDICATORS_BUY", 100.01, 110.0, 97.0, 100.5);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_distinguishes_patterns() {
        let a = signal_hash("INDICATORS_BUY", 100.0, 110.0, 97.0, 100.5);
        let b = signal_hash("INDICATORS_SELL", 100.0, 110.0, 97.0, 100.5);
        assert_ne!(a, b);
    }

    #[test]
    fn known_md5_vector() {
        // MD5("DOUBLE_BOTTOM|100.00|110.00|97.00|100.00") truncated to 12.
        let hash = signal_hash("DOUBLE_BOTTOM", 100.0, 110.0, 97.0, 100.0);
        let mut hasher = Md5::new();
        hasher.update(b"DOUBLE_BOTTOM|100.00|110.00|97.00|100.00");
        let expected = &hex::encode(hasher.finalize())[..12];
        assert_eq!(hash, expected);
    }

    #[test]
    fn risk_reward_ratio() {
        // Reward 10, risk 3 -> 3.33..
        assert!((risk_reward(100.0, 110.0, 97.0) - 10.0 / 3.0).abs() < 1e-9);
        // Bearish: entry 100, target 90, stop 103 -> 10 / 3.
        assert!((risk_reward(100.0, 90.0, 103.0) - 10.0 / 3.0).abs() < 1e-9);
        // Degenerate stop == entry.
        assert_eq!(risk_reward(100.0, 110.0, 100.0), 0.0);
    }

    #[test]
    fn pattern_directions() {
        assert!(PatternType::DoubleBottom.is_bullish());
        assert!(PatternType::TriangleBreakoutUp.is_bullish());
        assert!(PatternType::IndicatorsBuy.is_bullish());
        assert!(!PatternType::HeadAndShoulders.is_bullish());
        assert!(!PatternType::TriangleBreakoutDown.is_bullish());
        assert!(!PatternType::IndicatorsSell.is_bullish());
    }

    #[test]
    fn pattern_cooldowns() {
        assert_eq!(PatternType::DoubleBottom.cooldown(), Duration::hours(4));
        assert_eq!(PatternType::HeadAndShoulders.cooldown(), Duration::hours(6));
        assert_eq!(PatternType::TriangleBreakoutUp.cooldown(), Duration::hours(2));
        assert_eq!(PatternType::IndicatorsBuy.cooldown(), Duration::minutes(30));
        assert_eq!(PatternType::ManualBuy.cooldown(), Duration::hours(1));
    }

    #[test]
    fn pattern_round_trips_through_strings() {
        for pattern in [
            PatternType::DoubleBottom,
            PatternType::HeadAndShoulders,
            PatternType::TriangleBreakoutUp,
            PatternType::TriangleBreakoutDown,
            PatternType::IndicatorsBuy,
            PatternType::IndicatorsSell,
            PatternType::ManualBuy,
            PatternType::ManualSell,
        ] {
            assert_eq!(PatternType::parse(pattern.as_str()), Some(pattern));
        }
        assert_eq!(PatternType::parse("NOT_A_PATTERN"), None);
    }

    #[test]
    fn status_round_trips_and_terminality() {
        for status in [
            SignalStatus::Active,
            SignalStatus::HitTarget,
            SignalStatus::HitStop,
            SignalStatus::Expired,
        ] {
            assert_eq!(SignalStatus::parse(status.as_str()), Some(status));
        }
        assert!(!SignalStatus::Active.is_terminal());
        assert!(SignalStatus::HitTarget.is_terminal());
        assert!(SignalStatus::Expired.is_terminal());
    }

    #[test]
    fn signal_from_candidate_sets_derived_fields() {
        let candidate = PatternCandidate {
            pattern: PatternType::IndicatorsBuy,
            entry: 100.0,
            target: 110.0,
            stop: 97.0,
            confidence: 75.0,
        };
        let signal = Signal::from_candidate("BTCUSDT", &candidate, 100.2);

        assert_eq!(signal.status, SignalStatus::Active);
        assert!(!signal.activated);
        assert!(signal.closed_at.is_none());
        assert_eq!(signal.signal_type(), "BUY");
        assert!((signal.risk_reward - 10.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            signal.signal_id,
            signal_hash("INDICATORS_BUY", 100.0, 110.0, 97.0, 100.2)
        );
    }
}
