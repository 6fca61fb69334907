// =============================================================================
// Meridian Signal Engine — Main Entry Point
// =============================================================================
//
// Boots the full pipeline: embedded store, pair registry, multi-source
// streamer and signal manager.  The engine produces advisory signals only —
// no order is ever sent anywhere.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod indicators;
mod market_data;
mod patterns;
mod runtime_config;
mod signals;
mod sources;
mod storage;
mod streamer;
mod system;
mod types;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::runtime_config::RuntimeConfig;
use crate::system::TradingSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Meridian Signal Engine — Starting Up              ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("MERIDIAN_CONFIG").unwrap_or_else(|_| "runtime_config.json".into());
    let config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        let mut config = RuntimeConfig::default();
        config.apply_env_overrides();
        config.clamp();
        config
    });

    info!(
        update_interval = config.streaming.update_interval_secs,
        max_workers = config.streaming.max_workers,
        db_path = %config.database.path,
        fallback_to_simulated = config.streaming.fallback_to_simulated,
        "engine configuration"
    );

    // ── 2. Build and start the system ────────────────────────────────────
    let system = TradingSystem::init(config)?;

    let started = system.start();
    if !started.success {
        anyhow::bail!(
            "system failed to start: {}",
            started.error.unwrap_or_else(|| "unknown error".into())
        );
    }

    info!("system running — press Ctrl-C to stop");

    // ── 3. Run until interrupted ─────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let stopped = system.stop().await;
    if !stopped.success {
        warn!(error = ?stopped.error, "shutdown reported a problem");
    }

    info!("goodbye");
    Ok(())
}
