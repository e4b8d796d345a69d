//! Built-in entity catalog: versioning, accounts and the object tree.
//!
//! # Responsibility
//! - Register every built-in type with its hooks in a stable order.
//! - Seed the schema version row.

mod accounts;
pub mod tables;

pub use accounts::{GroupHooks, UserHooks, GROUP_IDS_METADATA, USER_IDS_METADATA};

use crate::model::entity::Entity;
use crate::registry::{EntityRegistry, RegistryError};
use crate::repo::{RepoResult, Repository, SearchMode};
use log::info;
use std::sync::Arc;
use tables::VERSION_TABLE;

/// Model name recorded in the version table.
pub const MODEL_NAME: &str = "rprj";
/// Schema version written by `ensure_version_row`.
pub const SCHEMA_VERSION: i64 = 2;

/// Registers the built-in types and resolves their foreign keys.
pub fn register_builtin(registry: &mut EntityRegistry) -> Result<(), RegistryError> {
    registry.register_plain(tables::version()?)?;
    registry.register_plain(tables::oauth_token()?)?;
    registry.register(tables::user()?, Arc::new(UserHooks))?;
    registry.register_plain(tables::membership()?)?;
    registry.register(tables::group()?, Arc::new(GroupHooks))?;
    registry.register_plain(tables::object()?)?;
    registry.register_plain(tables::folder()?)?;
    registry.register_plain(tables::link()?)?;
    registry.register_plain(tables::note()?)?;
    registry.register_plain(tables::page()?)?;
    registry.process_foreign_keys()
}

/// Fresh registry holding only the built-in types.
pub fn builtin_registry() -> Result<EntityRegistry, RegistryError> {
    let mut registry = EntityRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

/// Inserts the version row unless one exists. Returns whether it inserted.
pub fn ensure_version_row(repo: &Repository) -> RepoResult<bool> {
    let mut filter: Entity = repo.instance_for_table(VERSION_TABLE)?;
    filter.set("model_name", MODEL_NAME);
    if let Some(existing) = repo.search(&filter, SearchMode::exact(), "")?.first() {
        info!(
            "event=seed_version module=builtin status=ok action=kept version={}",
            existing.get("version").map(|value| value.to_string()).unwrap_or_default()
        );
        return Ok(false);
    }
    let mut row = filter.blank();
    row.set("model_name", MODEL_NAME);
    row.set("version", SCHEMA_VERSION);
    repo.insert(row)?;
    info!(
        "event=seed_version module=builtin status=ok action=created version={}",
        SCHEMA_VERSION
    );
    Ok(true)
}
