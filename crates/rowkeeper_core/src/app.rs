//! Application context shared by every repository.
//!
//! # Responsibility
//! - Own the store configuration, the entity registry and the pool.
//! - Hand out per-caller repositories.
//!
//! # Invariants
//! - Built once at startup; nothing in it is mutated afterwards.

use crate::config::StoreConfig;
use crate::db::{open_pool, prefixed_table_name, DbPool, DbResult};
use crate::registry::EntityRegistry;
use crate::repo::{RepoContext, Repository};
use std::sync::Arc;

pub struct AppContext {
    config: StoreConfig,
    registry: Arc<EntityRegistry>,
    pool: DbPool,
}

impl AppContext {
    /// Opens the configured pool around a fully registered catalog.
    pub fn open(config: StoreConfig, registry: EntityRegistry) -> DbResult<Arc<Self>> {
        let pool = open_pool(&config)?;
        Ok(Self::from_parts(config, Arc::new(registry), pool))
    }

    pub fn from_parts(config: StoreConfig, registry: Arc<EntityRegistry>, pool: DbPool) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry,
            pool,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Physical name of a logical table, e.g. `rprj_users`.
    pub fn table_name(&self, table: &str) -> String {
        prefixed_table_name(&self.config.table_prefix, table)
    }

    /// Context for `user_id` acting with `group_ids` under the configured prefix.
    pub fn context_for(&self, user_id: &str, group_ids: &[&str]) -> RepoContext {
        RepoContext::new(user_id, group_ids, &self.config.table_prefix)
    }

    pub fn repository(self: &Arc<Self>, context: RepoContext) -> Repository {
        Repository::new(Arc::clone(self), context)
    }
}
