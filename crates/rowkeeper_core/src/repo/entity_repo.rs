//! Generic entity repository.
//!
//! # Responsibility
//! - Execute search and transactional insert/update/delete for any
//!   registered entity type.
//! - Run ownership defaults and per-type hooks around every DML statement.
//!
//! # Invariants
//! - Every public write opens exactly one transaction; nested hook writes
//!   reuse it through `TxScope`.
//! - Any error rolls the whole transaction back.
//! - Owned entities are soft-deleted first and hard-deleted on the next
//!   delete; other kinds are always hard-deleted.
//! - An UPDATE or DELETE that matches no row is `NotFound`.

use super::error::{RepoError, RepoResult};
use super::hooks::{DeletePhase, TxScope};
use super::ownership;
use super::statement::{self, SearchMode, Statement};
use super::RepoContext;
use crate::app::AppContext;
use crate::db::{prefixed_table_name, Engine, Session};
use crate::model::column::TypeFamily;
use crate::model::descriptor::{object_columns as col, EntityKind, USERS_TABLE};
use crate::model::entity::Entity;
use crate::model::value::Value;
use crate::registry::{EntityRegistry, RegistryError};
use log::{debug, info, warn};
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;
use std::time::Instant;

/// Pools only ever hold SQLite connections.
const EXEC_ENGINE: Engine = Engine::Sqlite;

/// Repository bound to one caller context.
#[derive(Clone)]
pub struct Repository {
    app: Arc<AppContext>,
    context: RepoContext,
}

impl Repository {
    pub fn new(app: Arc<AppContext>, context: RepoContext) -> Self {
        Self { app, context }
    }

    pub fn context(&self) -> &RepoContext {
        &self.context
    }

    pub fn registry(&self) -> &EntityRegistry {
        self.app.registry()
    }

    /// Blank instance of a registered type.
    pub fn instance_for(&self, type_name: &str) -> RepoResult<Entity> {
        Ok(self.registry().instance_by_type_name(type_name)?)
    }

    pub fn instance_for_table(&self, table_name: &str) -> RepoResult<Entity> {
        Ok(self.registry().instance_by_table_name(table_name)?)
    }

    /// Physical table name under the context prefix.
    pub fn table_name(&self, table: &str) -> String {
        prefixed_table_name(&self.context.schema, table)
    }

    /// Rows matching every set column of `filter`.
    ///
    /// `order_by` is `col [ASC|DESC], ...` over declared columns; empty uses
    /// the type's default ordering.
    pub fn search(
        &self,
        filter: &Entity,
        mode: SearchMode,
        order_by: &str,
    ) -> RepoResult<Vec<Entity>> {
        let conn = self.app.pool().get()?;
        self.search_on(&conn, filter, mode, order_by)
    }

    pub fn insert(&self, entity: Entity) -> RepoResult<Entity> {
        let type_name = entity.type_name().to_string();
        self.in_transaction("repo_insert", &type_name, move |session| {
            self.insert_in(session, entity)
        })
    }

    pub fn update(&self, entity: Entity) -> RepoResult<Entity> {
        let type_name = entity.type_name().to_string();
        self.in_transaction("repo_update", &type_name, move |session| {
            self.update_in(session, entity)
        })
    }

    /// Soft-deletes an owned entity not yet flagged, hard-deletes otherwise.
    pub fn delete(&self, entity: Entity) -> RepoResult<Entity> {
        let type_name = entity.type_name().to_string();
        self.in_transaction("repo_delete", &type_name, move |session| {
            self.delete_in(session, entity)
        })
    }

    /// Looks `id` up across every owned table, returning the concrete type.
    pub fn object_by_id(&self, id: &str, include_deleted: bool) -> RepoResult<Option<Entity>> {
        let conn = self.app.pool().get()?;
        self.object_by_id_on(&conn, id, include_deleted)
    }

    /// The acting user's row, `None` for anonymous contexts.
    pub fn current_user(&self) -> RepoResult<Option<Entity>> {
        let conn = self.app.pool().get()?;
        self.current_user_on(&conn)
    }

    pub(crate) fn search_on(
        &self,
        conn: &Connection,
        filter: &Entity,
        mode: SearchMode,
        order_by: &str,
    ) -> RepoResult<Vec<Entity>> {
        let order = statement::parse_order_by(filter.descriptor(), order_by)?;
        let table = self.table_name(filter.table_name());
        let statement = statement::select(EXEC_ENGINE, &table, filter, mode, &order)?;
        self.log_statement(&statement);

        let columns: Vec<(&str, TypeFamily)> = filter
            .descriptor()
            .columns()
            .iter()
            .map(|column| (column.name.as_str(), column.family()))
            .collect();
        let mut prepared = conn.prepare(&statement.sql)?;
        let mut rows = prepared.query(params_from_iter(statement.params.iter()))?;
        let mut found = Vec::new();
        while let Some(row) = rows.next()? {
            let mut entity = filter.blank();
            for (index, (name, family)) in columns.iter().enumerate() {
                if let Some(value) = Value::from_sql_ref(row.get_ref(index)?, *family) {
                    entity.set(name, value);
                }
            }
            found.push(entity);
        }
        Ok(found)
    }

    pub(crate) fn object_by_id_on(
        &self,
        conn: &Connection,
        id: &str,
        include_deleted: bool,
    ) -> RepoResult<Option<Entity>> {
        for descriptor in self.registry().owned_descriptors() {
            let mut filter = Entity::new(Arc::clone(descriptor));
            filter.set(col::ID, id);
            let Some(found) = self
                .search_on(conn, &filter, SearchMode::exact(), "")?
                .into_iter()
                .next()
            else {
                continue;
            };
            let deleted = found
                .as_object()
                .map(|object| object.has_deleted_date())
                .unwrap_or(false);
            return Ok((include_deleted || !deleted).then_some(found));
        }
        Ok(None)
    }

    pub(crate) fn current_user_on(&self, conn: &Connection) -> RepoResult<Option<Entity>> {
        if !self.context.has_user() {
            return Ok(None);
        }
        let mut filter = match self.registry().instance_by_table_name(USERS_TABLE) {
            Ok(filter) => filter,
            Err(RegistryError::UnknownTable(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        filter.set(col::ID, self.context.user_id.as_str());
        Ok(self
            .search_on(conn, &filter, SearchMode::exact(), "")?
            .into_iter()
            .next())
    }

    pub(crate) fn insert_in(&self, session: &Session, mut entity: Entity) -> RepoResult<Entity> {
        let hooks = self.registry().hooks_for(entity.type_name());
        let tx = TxScope::new(self, session);
        if entity.kind() == EntityKind::Owned {
            ownership::apply_insert_defaults(&tx, &mut entity)?;
        }
        hooks.before_insert(&tx, &mut entity)?;

        let table = self.table_name(entity.table_name());
        let statement = statement::insert(EXEC_ENGINE, &table, &entity)?;
        self.execute(session, &table, &statement)?;

        hooks.after_insert(&tx, &mut entity)?;
        Ok(entity)
    }

    pub(crate) fn update_in(&self, session: &Session, mut entity: Entity) -> RepoResult<Entity> {
        statement::ensure_primary_key(&entity)?;
        let hooks = self.registry().hooks_for(entity.type_name());
        let tx = TxScope::new(self, session);
        if entity.kind() == EntityKind::Owned {
            ownership::touch_modified(&tx, &mut entity);
        }
        hooks.before_update(&tx, &mut entity)?;

        let table = self.table_name(entity.table_name());
        if let Some(statement) = statement::update(EXEC_ENGINE, &table, &entity)? {
            if self.execute(session, &table, &statement)? == 0 {
                return Err(RepoError::NotFound(not_found_label(&entity)));
            }
        }

        hooks.after_update(&tx, &mut entity)?;
        Ok(entity)
    }

    pub(crate) fn delete_in(&self, session: &Session, mut entity: Entity) -> RepoResult<Entity> {
        statement::ensure_primary_key(&entity)?;
        let hooks = self.registry().hooks_for(entity.type_name());
        let tx = TxScope::new(self, session);
        let table = self.table_name(entity.table_name());
        let phase = match entity.as_object() {
            Some(object) if !object.has_deleted_date() => DeletePhase::Soft,
            _ => DeletePhase::Hard,
        };

        if phase == DeletePhase::Soft {
            ownership::mark_soft_deleted(&tx, &mut entity);
        }
        hooks.before_delete(&tx, &mut entity, phase)?;

        let statement = match phase {
            DeletePhase::Soft => statement::update_columns(
                EXEC_ENGINE,
                &table,
                &entity,
                &[col::DELETED_BY, col::DELETED_DATE],
            )?
            .ok_or_else(|| RepoError::MissingPrimaryKey(entity.type_name().to_string()))?,
            DeletePhase::Hard => statement::delete(EXEC_ENGINE, &table, &entity)?,
        };
        if self.execute(session, &table, &statement)? == 0 {
            return Err(RepoError::NotFound(not_found_label(&entity)));
        }

        hooks.after_delete(&tx, &entity, phase)?;
        Ok(entity)
    }

    fn execute(&self, session: &Session, table: &str, statement: &Statement) -> RepoResult<usize> {
        self.log_statement(statement);
        session
            .execute(&statement.sql, &statement.params)
            .map_err(|err| RepoError::from_write(table, err))
    }

    fn in_transaction<T>(
        &self,
        event: &str,
        type_name: &str,
        op: impl FnOnce(&Session) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let session = Session::begin(self.app.pool().get()?)?;
        let outcome = match op(&session) {
            // A failed commit drops the session, which rolls it back.
            Ok(value) => session.commit().map(|()| value).map_err(RepoError::from),
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    warn!(
                        "event=tx_rollback module=repo status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        };
        match outcome {
            Ok(value) => {
                info!(
                    "event={} module=repo status=ok type={} duration_ms={}",
                    event,
                    type_name,
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event={} module=repo status=error type={} duration_ms={} error={}",
                    event,
                    type_name,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn log_statement(&self, statement: &Statement) {
        if self.app.config().verbose {
            debug!(
                "event=repo_sql module=repo sql=\"{}\" params={:?}",
                statement.sql, statement.params
            );
        }
    }
}

fn not_found_label(entity: &Entity) -> String {
    format!("{}({})", entity.type_name(), entity.key_summary())
}

#[cfg(test)]
mod tests {
    use crate::app::AppContext;
    use crate::builtin::{builtin_registry, ensure_version_row};
    use crate::config::StoreConfig;
    use crate::db::TransactionScope;
    use crate::model::value::Value;
    use crate::repo::SearchMode;
    use crate::schema::sync_app_schema;

    #[test]
    fn failed_commit_is_reported_and_rolled_back() {
        let app = AppContext::open(
            StoreConfig::sqlite_in_memory("rprj"),
            builtin_registry().unwrap(),
        )
        .unwrap();
        sync_app_schema(&app).unwrap();
        let repo = app.repository(app.context_for("", &[]));

        let result = repo.in_transaction("repo_insert", "UserGroup", |session| {
            session
                .connection()
                .execute_batch("PRAGMA defer_foreign_keys = ON;")?;
            session.execute(
                "INSERT INTO rprj_users_groups (user_id, group_id) VALUES (?1, ?2)",
                &[Value::from("nobody"), Value::from("nowhere")],
            )?;
            Ok(())
        });
        assert!(result.is_err());

        let memberships = repo.instance_for("UserGroup").unwrap();
        assert!(repo
            .search(&memberships, SearchMode::exact(), "")
            .unwrap()
            .is_empty());
        assert!(ensure_version_row(&repo).unwrap());
    }
}
