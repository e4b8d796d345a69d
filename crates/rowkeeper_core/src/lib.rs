//! Core of the rowkeeper entity layer.
//! Descriptors, the entity registry, the transactional repository and the
//! schema synchronizer live here.

pub mod app;
pub mod builtin;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod schema;

pub use app::AppContext;
pub use config::{ConfigError, PoolConfig, StoreConfig};
pub use db::{DbError, Engine};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::descriptor::{EntityDescriptor, EntityKind};
pub use model::entity::Entity;
pub use model::value::Value;
pub use registry::{EntityRegistry, RegistryError};
pub use repo::{
    DeletePhase, EntityHooks, RepoContext, RepoError, RepoResult, Repository, SearchMode,
    TxScope,
};
pub use schema::{SchemaError, SchemaReport, SchemaSynchronizer};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
