//! Transaction handle shared by a write and its hooks.
//!
//! # Invariants
//! - A session starts with `BEGIN IMMEDIATE`, taking the write lock up front.
//! - A session that is dropped without `commit` rolls back.
//! - A connection only returns to the pool outside a transaction, even when
//!   `COMMIT` or `ROLLBACK` failed.

use super::{DbResult, PooledConn};
use crate::model::value::Value;
use log::warn;
use rusqlite::{params_from_iter, Connection};

/// Marker for code that must run inside an open transaction.
pub trait TransactionScope {
    fn connection(&self) -> &Connection;
}

/// One pooled connection holding an open write transaction.
pub struct Session {
    conn: PooledConn,
    open: bool,
}

impl Session {
    pub fn begin(conn: PooledConn) -> DbResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(Self { conn, open: true })
    }

    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    pub fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        self.open = false;
        Ok(())
    }

    /// On failure the session stays open, so `Drop` retries the rollback.
    pub fn rollback(mut self) -> DbResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        self.open = false;
        Ok(())
    }
}

impl TransactionScope for Session {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.open && !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
                warn!("event=tx_rollback module=db status=error error={}", err);
            }
        }
    }
}
