// =============================================================================
// Signals Module
// =============================================================================
//
// Signal pipeline for the engine:
// - Model: patterns, lifecycle statuses, the truncated-MD5 identity hash
// - Validation: parameters, market conditions, uniqueness, cooldowns
// - Manager: creation, activation tracking, resolution, expiry, persistence

pub mod manager;
pub mod model;
pub mod validator;

pub use manager::{SignalManager, SignalSettings};
pub use model::{signal_hash, PatternCandidate, PatternType, Signal, SignalStatus};
pub use validator::{validate_market_conditions, validate_parameters};
