pub mod pair;
pub mod pair_manager;

// Re-export the pair types for convenient access (e.g. `use crate::market_data::TradingPair`).
pub use pair::{PairConfigUpdate, RangeStats, TradingPair};
pub use pair_manager::PairManager;
