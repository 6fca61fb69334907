// =============================================================================
// Persistence Store — embedded single-file database
// =============================================================================
//
// Durable, thread-safe storage for ticks, signals, indicators, configuration
// and audit logs.  One connection behind a `parking_lot::Mutex`; WAL journal
// with NORMAL synchronous semantics and a 10k-page cache.
//
// Transient failures (busy / locked) are retried up to MAX_RETRIES with
// linear backoff.  Constraint violations are never retried; a duplicate
// `signal_id` is detectable via `is_duplicate_signal` so the signal manager
// can suppress it.
// =============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::signals::model::{PatternType, Signal, SignalStatus};
use crate::types::PriceData;

/// Attempts per operation before a transient failure becomes permanent.
const MAX_RETRIES: u32 = 3;
/// Base backoff; attempt N sleeps N * RETRY_BASE.
const RETRY_BASE: Duration = Duration::from_millis(250);

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = 10000;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS price_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    symbol TEXT NOT NULL,
    price REAL NOT NULL,
    open_price REAL,
    high_price REAL,
    low_price REAL,
    close_price REAL,
    volume REAL,
    source TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_price_data_symbol_ts ON price_data(symbol, timestamp);
CREATE INDEX IF NOT EXISTS idx_price_data_ts ON price_data(timestamp);
CREATE INDEX IF NOT EXISTS idx_price_data_symbol ON price_data(symbol);

CREATE TABLE IF NOT EXISTS trading_signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signal_id TEXT UNIQUE NOT NULL,
    symbol TEXT NOT NULL,
    pattern_type TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    entry_price REAL NOT NULL,
    target_price REAL,
    stop_loss REAL,
    confidence REAL,
    risk_reward REAL,
    status TEXT DEFAULT 'ACTIVE',
    activated INTEGER DEFAULT 0,
    current_price REAL,
    profit_loss REAL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    closed_at TEXT,
    close_reason TEXT,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_signals_symbol ON trading_signals(symbol);
CREATE INDEX IF NOT EXISTS idx_signals_status ON trading_signals(status);
CREATE INDEX IF NOT EXISTS idx_signals_created_at ON trading_signals(created_at);
CREATE INDEX IF NOT EXISTS idx_signals_type ON trading_signals(signal_type);

CREATE TABLE IF NOT EXISTS technical_indicators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    symbol TEXT NOT NULL,
    indicator_name TEXT NOT NULL,
    indicator_value REAL,
    timeframe TEXT DEFAULT '5m',
    metadata TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_indicators_symbol_ts ON technical_indicators(symbol, timestamp);
CREATE INDEX IF NOT EXISTS idx_indicators_name ON technical_indicators(indicator_name);
CREATE INDEX IF NOT EXISTS idx_indicators_ts ON technical_indicators(timestamp);

CREATE TABLE IF NOT EXISTS configurations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    config_key TEXT UNIQUE NOT NULL,
    config_value TEXT NOT NULL,
    config_type TEXT DEFAULT 'string',
    description TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS system_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    level TEXT NOT NULL,
    component TEXT,
    message TEXT NOT NULL,
    details TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_logs_ts ON system_logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_level ON system_logs(level);
CREATE INDEX IF NOT EXISTS idx_logs_component ON system_logs(component);
"#;

// ---------------------------------------------------------------------------
// Query statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QueryStats {
    total_queries: u64,
    successful_queries: u64,
    failed_queries: u64,
    last_error: Option<String>,
}

/// Serialisable snapshot of store-level statistics.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub file_size_mb: f64,
    pub total_records: u64,
    pub tables: serde_json::Value,
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub success_rate: f64,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    stats: Arc<Mutex<QueryStats>>,
}

/// True when `err` wraps a UNIQUE-constraint violation on
/// `trading_signals.signal_id`.
pub fn is_duplicate_signal(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
            e.code == ErrorCode::ConstraintViolation && msg.contains("signal_id")
        }
        _ => false,
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

impl Database {
    /// Open (or create) the store at `path` and apply the schema.
    /// Schema failure here is fatal: the system must not start without a
    /// working store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create data dir {}", parent.display()))?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // we handle our own locking

        let conn = Connection::open_with_flags(&path, flags)
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("failed to initialize database schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!(journal_mode = %journal_mode, "WAL mode not active");
        }

        info!(path = %path.display(), "database initialised");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            stats: Arc::new(Mutex::new(QueryStats::default())),
        })
    }

    /// Run `op` against the connection, retrying transient failures with
    /// linear backoff.  Non-transient failures surface immediately.
    fn with_retry<T>(&self, op: impl Fn(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut last_err: Option<rusqlite::Error> = None;

        for attempt in 1..=MAX_RETRIES {
            let result = {
                let conn = self.conn.lock();
                op(&conn)
            };

            match result {
                Ok(value) => {
                    let mut stats = self.stats.lock();
                    stats.total_queries += 1;
                    stats.successful_queries += 1;
                    return Ok(value);
                }
                Err(e) if is_transient(&e) && attempt < MAX_RETRIES => {
                    warn!(attempt, error = %e, "transient store error — retrying");
                    last_err = Some(e);
                    std::thread::sleep(RETRY_BASE * attempt);
                }
                Err(e) => {
                    let mut stats = self.stats.lock();
                    stats.total_queries += 1;
                    stats.failed_queries += 1;
                    stats.last_error = Some(e.to_string());
                    return Err(anyhow::Error::new(e).context("store operation failed"));
                }
            }
        }

        let mut stats = self.stats.lock();
        stats.total_queries += 1;
        stats.failed_queries += 1;
        let e = last_err.expect("retry loop exited without error");
        stats.last_error = Some(e.to_string());
        Err(anyhow::Error::new(e).context(format!("store operation failed after {MAX_RETRIES} attempts")))
    }

    // -------------------------------------------------------------------------
    // Price data
    // -------------------------------------------------------------------------

    pub fn save_price_data(&self, tick: &PriceData) -> Result<()> {
        let tick = tick.clone();
        self.with_retry(move |conn| {
            conn.execute(
                "INSERT INTO price_data
                 (timestamp, symbol, price, open_price, high_price, low_price, close_price, volume, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tick.timestamp.to_rfc3339(),
                    tick.symbol,
                    tick.price,
                    tick.open,
                    tick.high,
                    tick.low,
                    tick.close,
                    tick.volume,
                    tick.source,
                ],
            )
            .map(|_| ())
        })
    }

    /// Insert a batch of ticks atomically; either all rows land or none.
    pub fn save_price_data_batch(&self, ticks: &[PriceData]) -> Result<usize> {
        if ticks.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("failed to begin batch transaction")?;

        let inserted = {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO price_data
                     (timestamp, symbol, price, open_price, high_price, low_price, close_price, volume, source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .context("failed to prepare batch insert")?;

            for tick in ticks {
                stmt.execute(params![
                    tick.timestamp.to_rfc3339(),
                    tick.symbol,
                    tick.price,
                    tick.open,
                    tick.high,
                    tick.low,
                    tick.close,
                    tick.volume,
                    tick.source,
                ])
                .context("batch insert row failed")?;
            }
            ticks.len()
        };

        tx.commit().context("failed to commit batch insert")?;

        let mut stats = self.stats.lock();
        stats.total_queries += 1;
        stats.successful_queries += 1;

        debug!(count = inserted, "tick batch persisted");
        Ok(inserted)
    }

    /// Most recent ticks for `symbol`, ordered by timestamp descending.
    pub fn get_price_data(&self, symbol: &str, limit: usize) -> Result<Vec<PriceData>> {
        let symbol = symbol.to_string();
        self.with_retry(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, symbol, price, open_price, high_price, low_price,
                        close_price, volume, source
                 FROM price_data WHERE symbol = ?1
                 ORDER BY timestamp DESC LIMIT ?2",
            )?;

            let rows = stmt.query_map(params![symbol, limit as i64], row_to_tick)?;
            rows.collect()
        })
    }

    pub fn get_latest_price(&self, symbol: &str) -> Result<Option<PriceData>> {
        let mut rows = self.get_price_data(symbol, 1)?;
        Ok(rows.pop())
    }

    // -------------------------------------------------------------------------
    // Trading signals
    // -------------------------------------------------------------------------

    /// Insert a new signal row.  A UNIQUE violation on `signal_id` surfaces
    /// as an error recognised by `is_duplicate_signal`.
    pub fn save_signal(&self, signal: &Signal) -> Result<()> {
        let s = signal.clone();
        self.with_retry(move |conn| {
            conn.execute(
                "INSERT INTO trading_signals
                 (signal_id, symbol, pattern_type, signal_type, entry_price, target_price,
                  stop_loss, confidence, risk_reward, status, activated, current_price,
                  profit_loss, created_at, updated_at, closed_at, close_reason, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    s.signal_id,
                    s.symbol,
                    s.pattern.as_str(),
                    s.signal_type(),
                    s.entry_price,
                    s.target_price,
                    s.stop_loss,
                    s.confidence,
                    s.risk_reward,
                    s.status.as_str(),
                    s.activated as i64,
                    s.current_price,
                    s.profit_loss_pct,
                    s.created_at.to_rfc3339(),
                    s.updated_at.to_rfc3339(),
                    s.closed_at.map(|t| t.to_rfc3339()),
                    s.close_reason,
                    s.metadata.to_string(),
                ],
            )
            .map(|_| ())
        })
    }

    /// Persist the mutable lifecycle fields of an existing signal.
    pub fn update_signal(&self, signal: &Signal) -> Result<()> {
        let s = signal.clone();
        self.with_retry(move |conn| {
            conn.execute(
                "UPDATE trading_signals
                 SET status = ?2, activated = ?3, current_price = ?4, profit_loss = ?5,
                     updated_at = ?6, closed_at = ?7, close_reason = ?8
                 WHERE signal_id = ?1",
                params![
                    s.signal_id,
                    s.status.as_str(),
                    s.activated as i64,
                    s.current_price,
                    s.profit_loss_pct,
                    s.updated_at.to_rfc3339(),
                    s.closed_at.map(|t| t.to_rfc3339()),
                    s.close_reason,
                ],
            )
            .map(|_| ())
        })
    }

    pub fn get_signals(
        &self,
        symbol: Option<&str>,
        status: Option<SignalStatus>,
        limit: usize,
    ) -> Result<Vec<Signal>> {
        let symbol = symbol.map(str::to_string);
        self.with_retry(move |conn| {
            let mut sql = String::from(
                "SELECT signal_id, symbol, pattern_type, entry_price, target_price, stop_loss,
                        confidence, risk_reward, status, activated, current_price, profit_loss,
                        created_at, updated_at, closed_at, close_reason, metadata
                 FROM trading_signals WHERE 1=1",
            );
            let mut binds: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(sym) = &symbol {
                sql.push_str(" AND symbol = ?");
                binds.push(Box::new(sym.clone()));
            }
            if let Some(st) = status {
                sql.push_str(" AND status = ?");
                binds.push(Box::new(st.as_str().to_string()));
            }
            sql.push_str(" ORDER BY created_at DESC LIMIT ?");
            binds.push(Box::new(limit as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(binds.iter().map(|b| b.as_ref())),
                row_to_signal,
            )?;
            rows.collect()
        })
    }

    /// All ACTIVE signals — used for recovery at startup.
    pub fn get_active_signals(&self) -> Result<Vec<Signal>> {
        self.get_signals(None, Some(SignalStatus::Active), usize::MAX / 2)
    }

    /// Delete terminal signal rows older than `days`.
    pub fn cleanup_closed_signals(&self, days: u32) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();
        self.with_retry(move |conn| {
            conn.execute(
                "DELETE FROM trading_signals WHERE status != 'ACTIVE' AND created_at < ?1",
                params![cutoff],
            )
        })
    }

    /// Per-pattern emitted/terminal counts with success rate.
    pub fn pattern_stats(&self) -> Result<serde_json::Value> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pattern_type,
                        COUNT(*) AS total,
                        SUM(CASE WHEN status = 'HIT_TARGET' THEN 1 ELSE 0 END) AS hit_target,
                        SUM(CASE WHEN status = 'HIT_STOP' THEN 1 ELSE 0 END) AS hit_stop,
                        SUM(CASE WHEN status = 'EXPIRED' THEN 1 ELSE 0 END) AS expired,
                        SUM(CASE WHEN status = 'ACTIVE' THEN 1 ELSE 0 END) AS active
                 FROM trading_signals GROUP BY pattern_type",
            )?;

            let mut patterns = serde_json::Map::new();
            let rows = stmt.query_map([], |row| {
                let pattern: String = row.get(0)?;
                let total: i64 = row.get(1)?;
                let hit_target: i64 = row.get(2)?;
                let hit_stop: i64 = row.get(3)?;
                let expired: i64 = row.get(4)?;
                let active: i64 = row.get(5)?;
                Ok((pattern, total, hit_target, hit_stop, expired, active))
            })?;

            for row in rows {
                let (pattern, total, hit_target, hit_stop, expired, active) = row?;
                let resolved = hit_target + hit_stop;
                let success_rate = if resolved > 0 {
                    hit_target as f64 / resolved as f64 * 100.0
                } else {
                    0.0
                };
                patterns.insert(
                    pattern,
                    serde_json::json!({
                        "total": total,
                        "active": active,
                        "hit_target": hit_target,
                        "hit_stop": hit_stop,
                        "expired": expired,
                        "success_rate": success_rate,
                    }),
                );
            }

            Ok(serde_json::Value::Object(patterns))
        })
    }

    // -------------------------------------------------------------------------
    // Technical indicators
    // -------------------------------------------------------------------------

    pub fn save_indicator(
        &self,
        symbol: &str,
        name: &str,
        value: f64,
        timeframe: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<()> {
        let symbol = symbol.to_string();
        let name = name.to_string();
        let timeframe = timeframe.to_string();
        let metadata = metadata.map(|m| m.to_string());
        self.with_retry(move |conn| {
            conn.execute(
                "INSERT INTO technical_indicators
                 (timestamp, symbol, indicator_name, indicator_value, timeframe, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![Utc::now().to_rfc3339(), symbol, name, value, timeframe, metadata],
            )
            .map(|_| ())
        })
    }

    pub fn get_indicators(
        &self,
        symbol: &str,
        name: Option<&str>,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let symbol = symbol.to_string();
        let name = name.map(str::to_string);
        let timeframe = timeframe.to_string();
        self.with_retry(move |conn| {
            let mut sql = String::from(
                "SELECT timestamp, symbol, indicator_name, indicator_value, timeframe, metadata
                 FROM technical_indicators WHERE symbol = ? AND timeframe = ?",
            );
            let mut binds: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
                Box::new(symbol.clone()),
                Box::new(timeframe.clone()),
            ];

            if let Some(n) = &name {
                sql.push_str(" AND indicator_name = ?");
                binds.push(Box::new(n.clone()));
            }
            sql.push_str(" ORDER BY timestamp DESC LIMIT ?");
            binds.push(Box::new(limit as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(binds.iter().map(|b| b.as_ref())),
                |row| {
                    let metadata: Option<String> = row.get(5)?;
                    Ok(serde_json::json!({
                        "timestamp": row.get::<_, String>(0)?,
                        "symbol": row.get::<_, String>(1)?,
                        "indicator_name": row.get::<_, String>(2)?,
                        "indicator_value": row.get::<_, Option<f64>>(3)?,
                        "timeframe": row.get::<_, String>(4)?,
                        "metadata": metadata
                            .and_then(|m| serde_json::from_str::<serde_json::Value>(&m).ok())
                            .unwrap_or(serde_json::json!({})),
                    }))
                },
            )?;
            rows.collect()
        })
    }

    // -------------------------------------------------------------------------
    // Configurations
    // -------------------------------------------------------------------------

    pub fn save_configuration(
        &self,
        key: &str,
        value: &serde_json::Value,
        description: Option<&str>,
    ) -> Result<()> {
        let (value_str, config_type) = match value {
            serde_json::Value::String(s) => (s.clone(), "string"),
            serde_json::Value::Bool(b) => (b.to_string(), "bool"),
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => (n.to_string(), "int"),
            serde_json::Value::Number(n) => (n.to_string(), "float"),
            other => (other.to_string(), "json"),
        };

        let key = key.to_string();
        let description = description.map(str::to_string);
        self.with_retry(move |conn| {
            conn.execute(
                "INSERT INTO configurations (config_key, config_value, config_type, description, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(config_key) DO UPDATE SET
                     config_value = excluded.config_value,
                     config_type = excluded.config_type,
                     description = COALESCE(excluded.description, configurations.description),
                     updated_at = excluded.updated_at",
                params![key, value_str, config_type, description, Utc::now().to_rfc3339()],
            )
            .map(|_| ())
        })
    }

    pub fn get_configuration(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let key = key.to_string();
        let row: Option<(String, String)> = self.with_retry(move |conn| {
            conn.query_row(
                "SELECT config_value, config_type FROM configurations WHERE config_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })?;

        Ok(row.map(|(value, config_type)| decode_config_value(&value, &config_type)))
    }

    pub fn get_all_configurations(&self) -> Result<serde_json::Value> {
        self.with_retry(|conn| {
            let mut stmt =
                conn.prepare("SELECT config_key, config_value, config_type FROM configurations")?;
            let mut configs = serde_json::Map::new();
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (key, value, config_type) = row?;
                configs.insert(key, decode_config_value(&value, &config_type));
            }
            Ok(serde_json::Value::Object(configs))
        })
    }

    // -------------------------------------------------------------------------
    // System logs
    // -------------------------------------------------------------------------

    pub fn save_system_log(
        &self,
        level: &str,
        component: &str,
        message: &str,
        details: Option<&serde_json::Value>,
    ) -> Result<()> {
        let level = level.to_uppercase();
        let component = component.to_string();
        let message = message.to_string();
        let details = details.map(|d| d.to_string());
        self.with_retry(move |conn| {
            conn.execute(
                "INSERT INTO system_logs (timestamp, level, component, message, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![Utc::now().to_rfc3339(), level, component, message, details],
            )
            .map(|_| ())
        })
    }

    pub fn get_system_logs(
        &self,
        level: Option<&str>,
        component: Option<&str>,
        hours: i64,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let cutoff = (Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
        let level = level.map(|l| l.to_uppercase());
        let component = component.map(str::to_string);
        self.with_retry(move |conn| {
            let mut sql =
                String::from("SELECT timestamp, level, component, message, details FROM system_logs WHERE timestamp >= ?");
            let mut binds: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(cutoff.clone())];

            if let Some(l) = &level {
                sql.push_str(" AND level = ?");
                binds.push(Box::new(l.clone()));
            }
            if let Some(c) = &component {
                sql.push_str(" AND component = ?");
                binds.push(Box::new(c.clone()));
            }
            sql.push_str(" ORDER BY timestamp DESC LIMIT ?");
            binds.push(Box::new(limit as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(binds.iter().map(|b| b.as_ref())),
                |row| {
                    let details: Option<String> = row.get(4)?;
                    Ok(serde_json::json!({
                        "timestamp": row.get::<_, String>(0)?,
                        "level": row.get::<_, String>(1)?,
                        "component": row.get::<_, Option<String>>(2)?,
                        "message": row.get::<_, String>(3)?,
                        "details": details
                            .and_then(|d| serde_json::from_str::<serde_json::Value>(&d).ok())
                            .unwrap_or(serde_json::json!({})),
                    }))
                },
            )?;
            rows.collect()
        })
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Delete rows older than `days` from price data, indicators and logs,
    /// then compact the file.
    pub fn cleanup_older_than(&self, days: u32) -> Result<serde_json::Value> {
        let cutoff = (Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();
        let mut removed = serde_json::Map::new();

        for table in ["price_data", "technical_indicators", "system_logs"] {
            let cutoff = cutoff.clone();
            let sql = format!("DELETE FROM {table} WHERE timestamp < ?1");
            let count = self.with_retry(move |conn| conn.execute(&sql, params![cutoff]))?;
            info!(table, removed = count, "old rows removed");
            removed.insert(table.to_string(), serde_json::json!(count));
        }

        self.with_retry(|conn| conn.execute_batch("VACUUM"))?;

        Ok(serde_json::Value::Object(removed))
    }

    /// ANALYZE + VACUUM + ANALYZE.
    pub fn optimize(&self) -> Result<()> {
        self.with_retry(|conn| conn.execute_batch("ANALYZE; VACUUM; ANALYZE;"))?;
        info!("database optimized");
        Ok(())
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        let file_size_mb = std::fs::metadata(&self.path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        let mut tables = serde_json::Map::new();
        let mut total_records = 0u64;

        for table in [
            "price_data",
            "trading_signals",
            "technical_indicators",
            "configurations",
            "system_logs",
        ] {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let count: i64 = self.with_retry(move |conn| conn.query_row(&sql, [], |row| row.get(0)))?;
            tables.insert(table.to_string(), serde_json::json!(count));
            total_records += count as u64;
        }

        let stats = self.stats.lock();
        let success_rate = if stats.total_queries > 0 {
            stats.successful_queries as f64 / stats.total_queries as f64 * 100.0
        } else {
            0.0
        };

        Ok(DatabaseStats {
            file_size_mb,
            total_records,
            tables: serde_json::Value::Object(tables),
            total_queries: stats.total_queries,
            successful_queries: stats.successful_queries,
            failed_queries: stats.failed_queries,
            success_rate,
        })
    }

    /// Aggregate summary of stored price data and signals, optionally scoped
    /// to one symbol.
    pub fn data_summary(&self, symbol: Option<&str>) -> Result<serde_json::Value> {
        let symbol = symbol.map(str::to_string);
        self.with_retry(move |conn| {
            let price = match &symbol {
                Some(sym) => conn.query_row(
                    "SELECT COUNT(*), MIN(timestamp), MAX(timestamp), AVG(price), MIN(price), MAX(price)
                     FROM price_data WHERE symbol = ?1",
                    params![sym],
                    |row| {
                        Ok(serde_json::json!({
                            "total": row.get::<_, i64>(0)?,
                            "first_record": row.get::<_, Option<String>>(1)?,
                            "last_record": row.get::<_, Option<String>>(2)?,
                            "avg_price": row.get::<_, Option<f64>>(3)?,
                            "min_price": row.get::<_, Option<f64>>(4)?,
                            "max_price": row.get::<_, Option<f64>>(5)?,
                        }))
                    },
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*), MIN(timestamp), MAX(timestamp), COUNT(DISTINCT symbol)
                     FROM price_data",
                    [],
                    |row| {
                        Ok(serde_json::json!({
                            "total": row.get::<_, i64>(0)?,
                            "first_record": row.get::<_, Option<String>>(1)?,
                            "last_record": row.get::<_, Option<String>>(2)?,
                            "unique_symbols": row.get::<_, i64>(3)?,
                        }))
                    },
                )?,
            };

            let signal_filter = symbol.as_deref().unwrap_or("%");
            let signals = conn.query_row(
                "SELECT COUNT(*),
                        SUM(CASE WHEN status = 'ACTIVE' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'HIT_TARGET' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN status = 'HIT_STOP' THEN 1 ELSE 0 END)
                 FROM trading_signals WHERE symbol LIKE ?1",
                params![signal_filter],
                |row| {
                    Ok(serde_json::json!({
                        "total": row.get::<_, i64>(0)?,
                        "active": row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        "profitable": row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                        "stopped": row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    }))
                },
            )?;

            Ok(serde_json::json!({ "price_data": price, "signals": signals }))
        })
    }

    /// Connectivity, integrity probe, file size and error rate.
    pub fn health_check(&self) -> serde_json::Value {
        let mut issues: Vec<String> = Vec::new();
        let mut status = "healthy";
        let mut checks = serde_json::Map::new();

        let connectivity = self
            .with_retry(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .is_ok();
        checks.insert("connectivity".into(), serde_json::json!(if connectivity { "ok" } else { "error" }));
        if !connectivity {
            issues.push("connectivity check failed".into());
            status = "unhealthy";
        }

        let integrity = self
            .with_retry(|conn| {
                conn.query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0))
            })
            .map(|r| r == "ok")
            .unwrap_or(false);
        checks.insert("integrity".into(), serde_json::json!(if integrity { "ok" } else { "error" }));
        if !integrity {
            issues.push("integrity problems detected".into());
            status = "unhealthy";
        }

        let file_size_mb = std::fs::metadata(&self.path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);
        checks.insert("disk_usage_mb".into(), serde_json::json!(file_size_mb));
        if file_size_mb > 1000.0 {
            issues.push(format!("database file large: {file_size_mb:.1}MB"));
            if status == "healthy" {
                status = "warning";
            }
        }

        let (error_rate, total) = {
            let stats = self.stats.lock();
            let rate = if stats.total_queries > 0 {
                stats.failed_queries as f64 / stats.total_queries as f64 * 100.0
            } else {
                0.0
            };
            (rate, stats.total_queries)
        };
        checks.insert("error_rate_pct".into(), serde_json::json!(error_rate));
        if total > 0 && error_rate > 10.0 {
            issues.push(format!("high query error rate: {error_rate:.1}%"));
            if status == "healthy" {
                status = "degraded";
            }
        }

        serde_json::json!({
            "status": status,
            "issues": issues,
            "checks": checks,
        })
    }

    /// Produce a consistent copy at `target` using the online-backup API.
    pub fn backup(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create backup dir {}", parent.display()))?;
            }
        }

        let conn = self.conn.lock();
        let mut dest = Connection::open(target)
            .with_context(|| format!("failed to open backup target {}", target.display()))?;

        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)
            .context("failed to start online backup")?;
        backup
            .run_to_completion(100, Duration::from_millis(10), None)
            .context("online backup failed")?;

        info!(target = %target.display(), "database backup created");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_tick(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceData> {
    Ok(PriceData {
        timestamp: parse_ts(row.get::<_, String>(0)?),
        symbol: row.get(1)?,
        price: row.get(2)?,
        open: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        high: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        low: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        close: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
        volume: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        source: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
    })
}

fn row_to_signal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Signal> {
    let pattern_raw: String = row.get(2)?;
    let status_raw: String = row.get(8)?;
    let metadata_raw: Option<String> = row.get(16)?;

    Ok(Signal {
        signal_id: row.get(0)?,
        symbol: row.get(1)?,
        pattern: PatternType::parse(&pattern_raw).unwrap_or(PatternType::ManualBuy),
        entry_price: row.get(3)?,
        target_price: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        stop_loss: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        confidence: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
        risk_reward: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        status: SignalStatus::parse(&status_raw).unwrap_or(SignalStatus::Active),
        activated: row.get::<_, i64>(9)? != 0,
        current_price: row.get::<_, Option<f64>>(10)?.unwrap_or(0.0),
        profit_loss_pct: row.get(11)?,
        created_at: parse_ts(row.get::<_, String>(12)?),
        updated_at: parse_ts(row.get::<_, String>(13)?),
        closed_at: row.get::<_, Option<String>>(14)?.map(parse_ts),
        close_reason: row.get(15)?,
        metadata: metadata_raw
            .and_then(|m| serde_json::from_str(&m).ok())
            .unwrap_or(serde_json::json!({})),
    })
}

fn decode_config_value(value: &str, config_type: &str) -> serde_json::Value {
    match config_type {
        "int" => value
            .parse::<i64>()
            .map(|v| serde_json::json!(v))
            .unwrap_or_else(|_| serde_json::json!(value)),
        "float" => value
            .parse::<f64>()
            .map(|v| serde_json::json!(v))
            .unwrap_or_else(|_| serde_json::json!(value)),
        "bool" => serde_json::json!(matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")),
        "json" => serde_json::from_str(value).unwrap_or_else(|_| serde_json::json!(value)),
        _ => serde_json::json!(value),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::model::PatternCandidate;
    use tempfile::tempdir;

    fn open_temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn sample_tick(symbol: &str, price: f64, offset_secs: i64) -> PriceData {
        PriceData {
            timestamp: Utc::now() + chrono::Duration::seconds(offset_secs),
            symbol: symbol.to_string(),
            price,
            open: price - 1.0,
            high: price + 2.0,
            low: price - 2.0,
            close: price,
            volume: 1234.5,
            source: "Test".to_string(),
        }
    }

    fn sample_signal(entry: f64) -> Signal {
        let candidate = PatternCandidate {
            pattern: PatternType::DoubleBottom,
            entry,
            target: entry * 1.05,
            stop: entry * 0.985,
            confidence: 80.0,
        };
        Signal::from_candidate("BTCUSDT", &candidate, entry * 0.999)
    }

    #[test]
    fn batch_insert_round_trips_in_desc_order() {
        let (_dir, db) = open_temp_db();

        let ticks: Vec<PriceData> = (0..5)
            .map(|i| sample_tick("BTCUSDT", 45_000.0 + i as f64, i))
            .collect();
        assert_eq!(db.save_price_data_batch(&ticks).unwrap(), 5);

        let loaded = db.get_price_data("BTCUSDT", 100).unwrap();
        assert_eq!(loaded.len(), 5);
        // Newest first.
        assert_eq!(loaded[0].price, 45_004.0);
        assert_eq!(loaded[4].price, 45_000.0);
    }

    #[test]
    fn latest_price_is_newest_row() {
        let (_dir, db) = open_temp_db();
        db.save_price_data(&sample_tick("ETHUSDT", 3_000.0, 0)).unwrap();
        db.save_price_data(&sample_tick("ETHUSDT", 3_010.0, 5)).unwrap();

        let latest = db.get_latest_price("ETHUSDT").unwrap().unwrap();
        assert_eq!(latest.price, 3_010.0);
        assert!(db.get_latest_price("XRPUSDT").unwrap().is_none());
    }

    #[test]
    fn signal_round_trip_preserves_fields() {
        let (_dir, db) = open_temp_db();
        let signal = sample_signal(43_000.0);
        db.save_signal(&signal).unwrap();

        let loaded = db
            .get_signals(Some("BTCUSDT"), None, 10)
            .unwrap()
            .pop()
            .unwrap();

        assert_eq!(loaded.signal_id, signal.signal_id);
        assert_eq!(loaded.pattern, signal.pattern);
        assert_eq!(loaded.status, signal.status);
        assert_eq!(loaded.activated, signal.activated);
        assert!((loaded.entry_price - signal.entry_price).abs() < 1e-9);
        assert!((loaded.target_price - signal.target_price).abs() < 1e-9);
        assert!((loaded.stop_loss - signal.stop_loss).abs() < 1e-9);
        assert!((loaded.confidence - signal.confidence).abs() < 1e-9);
        assert!((loaded.risk_reward - signal.risk_reward).abs() < 1e-9);
        assert!(loaded.closed_at.is_none());
    }

    #[test]
    fn duplicate_signal_id_is_detectable() {
        let (_dir, db) = open_temp_db();
        let signal = sample_signal(43_000.0);
        db.save_signal(&signal).unwrap();

        let err = db.save_signal(&signal).unwrap_err();
        assert!(is_duplicate_signal(&err));
    }

    #[test]
    fn update_signal_persists_lifecycle_fields() {
        let (_dir, db) = open_temp_db();
        let mut signal = sample_signal(43_000.0);
        db.save_signal(&signal).unwrap();

        signal.activated = true;
        signal.status = SignalStatus::HitTarget;
        signal.profit_loss_pct = Some(5.0);
        signal.closed_at = Some(Utc::now());
        signal.close_reason = Some("target reached".to_string());
        db.update_signal(&signal).unwrap();

        let loaded = db.get_signals(None, None, 10).unwrap().pop().unwrap();
        assert_eq!(loaded.status, SignalStatus::HitTarget);
        assert!(loaded.activated);
        assert_eq!(loaded.profit_loss_pct, Some(5.0));
        assert!(loaded.closed_at.is_some());
        assert_eq!(loaded.close_reason.as_deref(), Some("target reached"));
    }

    #[test]
    fn status_filter_selects_active_rows() {
        let (_dir, db) = open_temp_db();
        let mut a = sample_signal(43_000.0);
        let b = sample_signal(44_000.0);
        db.save_signal(&a).unwrap();
        db.save_signal(&b).unwrap();

        a.status = SignalStatus::HitStop;
        a.closed_at = Some(Utc::now());
        db.update_signal(&a).unwrap();

        let active = db.get_active_signals().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].signal_id, b.signal_id);
    }

    #[test]
    fn configuration_values_keep_their_types() {
        let (_dir, db) = open_temp_db();
        db.save_configuration("streaming.updateIntervalSec", &serde_json::json!(5), None)
            .unwrap();
        db.save_configuration("trading.minConfidenceThreshold", &serde_json::json!(0.6), None)
            .unwrap();
        db.save_configuration("streaming.fallbackToSimulated", &serde_json::json!(true), None)
            .unwrap();
        db.save_configuration("database.path", &serde_json::json!("data/x.db"), None)
            .unwrap();

        assert_eq!(
            db.get_configuration("streaming.updateIntervalSec").unwrap(),
            Some(serde_json::json!(5))
        );
        assert_eq!(
            db.get_configuration("trading.minConfidenceThreshold").unwrap(),
            Some(serde_json::json!(0.6))
        );
        assert_eq!(
            db.get_configuration("streaming.fallbackToSimulated").unwrap(),
            Some(serde_json::json!(true))
        );
        assert_eq!(
            db.get_configuration("database.path").unwrap(),
            Some(serde_json::json!("data/x.db"))
        );
        assert_eq!(db.get_configuration("missing.key").unwrap(), None);

        // Upsert replaces in place.
        db.save_configuration("streaming.updateIntervalSec", &serde_json::json!(9), None)
            .unwrap();
        assert_eq!(
            db.get_configuration("streaming.updateIntervalSec").unwrap(),
            Some(serde_json::json!(9))
        );

        let all = db.get_all_configurations().unwrap();
        assert_eq!(all.as_object().unwrap().len(), 4);
    }

    #[test]
    fn system_logs_filter_by_level() {
        let (_dir, db) = open_temp_db();
        db.save_system_log("info", "streamer", "cycle complete", None).unwrap();
        db.save_system_log("error", "storage", "disk full", Some(&serde_json::json!({"space": 0})))
            .unwrap();

        let errors = db.get_system_logs(Some("error"), None, 24, 10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["component"], "storage");

        let all = db.get_system_logs(None, None, 24, 10).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn cleanup_removes_only_old_rows() {
        let (_dir, db) = open_temp_db();
        let old = PriceData {
            timestamp: Utc::now() - chrono::Duration::days(40),
            ..sample_tick("BTCUSDT", 40_000.0, 0)
        };
        db.save_price_data(&old).unwrap();
        db.save_price_data(&sample_tick("BTCUSDT", 45_000.0, 0)).unwrap();

        let removed = db.cleanup_older_than(30).unwrap();
        assert_eq!(removed["price_data"], 1);
        assert_eq!(db.get_price_data("BTCUSDT", 10).unwrap().len(), 1);
    }

    #[test]
    fn cleanup_closed_signals_spares_active() {
        let (_dir, db) = open_temp_db();
        let mut old_closed = sample_signal(43_000.0);
        old_closed.created_at = Utc::now() - chrono::Duration::days(60);
        old_closed.status = SignalStatus::Expired;
        db.save_signal(&old_closed).unwrap();

        let mut old_active = sample_signal(44_000.0);
        old_active.created_at = Utc::now() - chrono::Duration::days(60);
        db.save_signal(&old_active).unwrap();

        let removed = db.cleanup_closed_signals(30).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.get_signals(None, None, 10).unwrap().len(), 1);
    }

    #[test]
    fn pattern_stats_counts_outcomes() {
        let (_dir, db) = open_temp_db();
        let mut won = sample_signal(43_000.0);
        db.save_signal(&won).unwrap();
        won.status = SignalStatus::HitTarget;
        db.update_signal(&won).unwrap();

        let mut lost = sample_signal(44_000.0);
        db.save_signal(&lost).unwrap();
        lost.status = SignalStatus::HitStop;
        db.update_signal(&lost).unwrap();

        let stats = db.pattern_stats().unwrap();
        let double_bottom = &stats["DOUBLE_BOTTOM"];
        assert_eq!(double_bottom["total"], 2);
        assert_eq!(double_bottom["hit_target"], 1);
        assert_eq!(double_bottom["hit_stop"], 1);
        assert_eq!(double_bottom["success_rate"], 50.0);
    }

    #[test]
    fn health_check_reports_healthy_store() {
        let (_dir, db) = open_temp_db();
        let health = db.health_check();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["checks"]["connectivity"], "ok");
        assert_eq!(health["checks"]["integrity"], "ok");
    }

    #[test]
    fn backup_produces_consistent_copy() {
        let (dir, db) = open_temp_db();
        db.save_price_data(&sample_tick("BTCUSDT", 45_000.0, 0)).unwrap();
        let signal = sample_signal(43_000.0);
        db.save_signal(&signal).unwrap();

        let backup_path = dir.path().join("backup.db");
        db.backup(&backup_path).unwrap();

        let restored = Database::open(&backup_path).unwrap();
        assert_eq!(restored.get_price_data("BTCUSDT", 10).unwrap().len(), 1);
        assert_eq!(restored.get_signals(None, None, 10).unwrap().len(), 1);
    }

    #[test]
    fn indicators_round_trip() {
        let (_dir, db) = open_temp_db();
        db.save_indicator("BTCUSDT", "RSI", 62.5, "5m", None).unwrap();
        db.save_indicator("BTCUSDT", "SMA_12", 45_100.0, "5m", None).unwrap();

        let all = db.get_indicators("BTCUSDT", None, "5m", 10).unwrap();
        assert_eq!(all.len(), 2);

        let rsi_only = db.get_indicators("BTCUSDT", Some("RSI"), "5m", 10).unwrap();
        assert_eq!(rsi_only.len(), 1);
        assert_eq!(rsi_only[0]["indicator_value"], 62.5);
    }

    #[test]
    fn stats_counts_tables() {
        let (_dir, db) = open_temp_db();
        db.save_price_data(&sample_tick("BTCUSDT", 45_000.0, 0)).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.tables["price_data"], 1);
        assert!(stats.total_records >= 1);
        assert!(stats.success_rate > 0.0);
    }
}
