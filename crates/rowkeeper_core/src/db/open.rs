//! Connection pool bootstrap for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite pools sized from `PoolConfig`.
//! - Configure connection pragmas on every pooled connection.
//!
//! # Invariants
//! - Every pooled connection has `foreign_keys=ON` and a busy timeout.
//! - File databases run in WAL mode so readers never block the writer.
//! - An in-memory pool holds exactly one connection, so every caller sees
//!   the same database.

use super::{DbError, DbResult, Engine};
use crate::config::StoreConfig;
use log::{error, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::{Duration, Instant};

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Opens a pool for `config`.
///
/// # Errors
/// - `UnsupportedEngine` for engines without a linked driver.
/// - `Pool` when the initial connections cannot be established.
pub fn open_pool(config: &StoreConfig) -> DbResult<DbPool> {
    if config.engine != Engine::Sqlite {
        error!(
            "event=db_open module=db status=error engine={} error_code=unsupported_engine",
            config.engine
        );
        return Err(DbError::UnsupportedEngine(config.engine));
    }
    if config.is_in_memory() {
        return open_memory(config.busy_timeout());
    }

    let started_at = Instant::now();
    let path = config.sqlite_path().to_string();
    info!("event=db_open module=db status=start mode=file engine=sqlite");

    let busy_timeout = config.busy_timeout();
    let manager = SqliteConnectionManager::file(&path)
        .with_init(move |conn| bootstrap_connection(conn, busy_timeout, true));
    let max_size = config.pool.max_open.max(1);
    let built = r2d2::Pool::builder()
        .max_size(max_size)
        .min_idle(Some(config.pool.max_idle.min(max_size)))
        .max_lifetime(config.pool.max_lifetime())
        .idle_timeout(None)
        .connection_timeout(busy_timeout.max(Duration::from_secs(1)))
        .build(manager);

    finish_open("file", started_at, built)
}

/// Opens a single-connection in-memory pool.
pub fn open_pool_in_memory() -> DbResult<DbPool> {
    open_memory(StoreConfig::default().busy_timeout())
}

fn open_memory(busy_timeout: Duration) -> DbResult<DbPool> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory engine=sqlite");

    let manager = SqliteConnectionManager::memory()
        .with_init(move |conn| bootstrap_connection(conn, busy_timeout, false));
    let built = r2d2::Pool::builder()
        .max_size(1)
        .min_idle(Some(1))
        .max_lifetime(None)
        .idle_timeout(None)
        .connection_timeout(busy_timeout.max(Duration::from_secs(1)))
        .build(manager);

    finish_open("memory", started_at, built)
}

fn finish_open(
    mode: &str,
    started_at: Instant,
    built: Result<DbPool, r2d2::Error>,
) -> DbResult<DbPool> {
    match built {
        Ok(pool) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={} max_size={}",
                mode,
                started_at.elapsed().as_millis(),
                pool.max_size()
            );
            Ok(pool)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    busy_timeout: Duration,
    wal: bool,
) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    if wal {
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    }
    Ok(())
}
