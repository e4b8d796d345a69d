//! Schema creation and drift detection.
//!
//! # Responsibility
//! - Translate descriptors into per-engine DDL.
//! - Order table creation by foreign-key dependencies.
//! - Create missing tables and report drift on existing ones.

pub mod ddl;
pub mod dialect;
pub mod sync;
pub mod topo;

pub use ddl::create_table_sql;
pub use sync::{
    sync_app_schema, LiveColumn, SchemaBackend, SchemaDrift, SchemaError, SchemaReport,
    SchemaSynchronizer, SqliteBackend,
};
pub use topo::{creation_order, CreationOrder, DependencyGraph};
