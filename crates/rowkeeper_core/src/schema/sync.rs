//! Schema synchronization against a live catalog.
//!
//! # Responsibility
//! - Create missing tables in dependency order.
//! - Compare existing tables with their descriptors and report drift.
//!
//! # Invariants
//! - Existing tables are never altered; drift carries the statement that
//!   would fix it but nothing executes it.
//! - Drift and cycles are warnings, not errors.

use super::ddl::create_table_sql;
use super::dialect::{
    add_column_sql, alter_column_type_sql, live_columns_sql, normalize_declared_type,
    normalize_live_type, table_exists_sql,
};
use super::topo::creation_order;
use crate::app::AppContext;
use crate::db::{prefixed_table_name, DbError, Engine};
use crate::registry::{EntityRegistry, RegistryError};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum SchemaError {
    Db(DbError),
    Registry(RegistryError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Registry(err) => Some(err),
        }
    }
}

impl From<DbError> for SchemaError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SchemaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<r2d2::Error> for SchemaError {
    fn from(value: r2d2::Error) -> Self {
        Self::Db(DbError::Pool(value))
    }
}

impl From<RegistryError> for SchemaError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// One column as reported by the live catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub sql_type: String,
    /// Declared character length, when the catalog reports it separately.
    pub max_length: Option<i64>,
}

/// Catalog access needed by the synchronizer.
pub trait SchemaBackend {
    fn engine(&self) -> Engine;
    fn table_exists(&mut self, table: &str) -> Result<bool, SchemaError>;
    fn live_columns(&mut self, table: &str) -> Result<Vec<LiveColumn>, SchemaError>;
    fn execute_ddl(&mut self, sql: &str) -> Result<(), SchemaError>;
}

/// SQLite catalog over one connection.
pub struct SqliteBackend<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteBackend<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SchemaBackend for SqliteBackend<'_> {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, SchemaError> {
        let found: Option<String> = self
            .conn
            .query_row(table_exists_sql(Engine::Sqlite), [table], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn live_columns(&mut self, table: &str) -> Result<Vec<LiveColumn>, SchemaError> {
        let mut stmt = self.conn.prepare(&live_columns_sql(Engine::Sqlite, table))?;
        let rows = stmt.query_map([], |row| {
            Ok(LiveColumn {
                name: row.get(0)?,
                sql_type: row.get(1)?,
                max_length: None,
            })
        })?;
        let mut columns = Vec::new();
        for column in rows {
            columns.push(column?);
        }
        Ok(columns)
    }

    fn execute_ddl(&mut self, sql: &str) -> Result<(), SchemaError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

/// Difference between a live table and its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDrift {
    TypeMismatch {
        table: String,
        column: String,
        declared: String,
        live: String,
        /// `None` when the engine cannot alter a column type in place.
        alter_sql: Option<String>,
    },
    MissingColumn {
        table: String,
        column: String,
        declared: String,
        alter_sql: String,
    },
}

impl Display for SchemaDrift {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                table,
                column,
                declared,
                live,
                ..
            } => write!(f, "{table}.{column}: declared {declared}, live {live}"),
            Self::MissingColumn {
                table,
                column,
                declared,
                ..
            } => write!(f, "{table}.{column}: missing, declared {declared}"),
        }
    }
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Physical table names in creation order.
    pub order: Vec<String>,
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub drift: Vec<SchemaDrift>,
    pub cycles: Vec<Vec<String>>,
}

impl SchemaReport {
    pub fn has_drift(&self) -> bool {
        !self.drift.is_empty()
    }
}

/// Creates missing tables and reports drift for one table prefix.
pub struct SchemaSynchronizer<'r> {
    registry: &'r EntityRegistry,
    prefix: String,
}

impl<'r> SchemaSynchronizer<'r> {
    pub fn new(registry: &'r EntityRegistry, prefix: &str) -> Self {
        Self {
            registry,
            prefix: prefix.to_string(),
        }
    }

    /// `CREATE TABLE` statements for `engine`, in creation order.
    pub fn create_statements(&self, engine: Engine) -> Result<Vec<String>, SchemaError> {
        creation_order(self.registry)
            .tables
            .iter()
            .map(|table| {
                let descriptor = self.registry.descriptor_for_table(table)?;
                Ok(create_table_sql(engine, &self.prefix, descriptor))
            })
            .collect()
    }

    pub fn ensure_schema(
        &self,
        backend: &mut dyn SchemaBackend,
    ) -> Result<SchemaReport, SchemaError> {
        let started_at = Instant::now();
        let engine = backend.engine();
        let order = creation_order(self.registry);
        let mut report = SchemaReport {
            cycles: order.cycles.clone(),
            ..SchemaReport::default()
        };

        for table in &order.tables {
            let descriptor = self.registry.descriptor_for_table(table)?;
            let physical = prefixed_table_name(&self.prefix, table);
            report.order.push(physical.clone());

            if !backend.table_exists(&physical)? {
                let sql = create_table_sql(engine, &self.prefix, descriptor);
                if let Err(err) = backend.execute_ddl(&sql) {
                    warn!(
                        "event=schema_create module=schema status=error table={} error={}",
                        physical, err
                    );
                    return Err(err);
                }
                info!(
                    "event=schema_create module=schema status=ok engine={} table={}",
                    engine, physical
                );
                report.created.push(physical);
                continue;
            }

            let live: HashMap<String, LiveColumn> = backend
                .live_columns(&physical)?
                .into_iter()
                .map(|column| (column.name.to_ascii_lowercase(), column))
                .collect();
            for column in descriptor.columns() {
                let declared = normalize_declared_type(engine, &column.sql_type);
                let drift = match live.get(&column.name.to_ascii_lowercase()) {
                    None => Some(SchemaDrift::MissingColumn {
                        table: physical.clone(),
                        column: column.name.clone(),
                        declared: column.sql_type.clone(),
                        alter_sql: add_column_sql(engine, &physical, &column.name, &column.sql_type),
                    }),
                    Some(found) => {
                        let live_type =
                            normalize_live_type(engine, &found.sql_type, found.max_length);
                        (live_type != declared).then(|| SchemaDrift::TypeMismatch {
                            table: physical.clone(),
                            column: column.name.clone(),
                            declared: column.sql_type.clone(),
                            live: found.sql_type.clone(),
                            alter_sql: alter_column_type_sql(
                                engine,
                                &physical,
                                &column.name,
                                &column.sql_type,
                            ),
                        })
                    }
                };
                if let Some(drift) = drift {
                    warn!(
                        "event=schema_drift module=schema status=warn engine={} detail=\"{}\"",
                        engine, drift
                    );
                    report.drift.push(drift);
                }
            }
            report.existing.push(physical);
        }

        info!(
            "event=schema_sync module=schema status=ok engine={} created={} existing={} drift={} cycles={} duration_ms={}",
            engine,
            report.created.len(),
            report.existing.len(),
            report.drift.len(),
            report.cycles.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}

/// Synchronizes the configured database of `app`.
pub fn sync_app_schema(app: &AppContext) -> Result<SchemaReport, SchemaError> {
    let conn = app.pool().get()?;
    let mut backend = SqliteBackend::new(&conn);
    SchemaSynchronizer::new(app.registry(), &app.config().table_prefix).ensure_schema(&mut backend)
}
