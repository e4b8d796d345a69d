//! Lifecycle hooks and the transaction scope they run in.
//!
//! # Responsibility
//! - Define the per-type hook contract invoked around every DML statement.
//! - Give hooks repository access bound to the caller's open transaction.
//!
//! # Invariants
//! - Every nested write made through `TxScope` shares the outer transaction;
//!   a failure anywhere rolls back the whole cascade.
//! - Hooks never open connections of their own.

use super::entity_repo::Repository;
use super::error::RepoResult;
use super::statement::SearchMode;
use super::RepoContext;
use crate::db::{Session, TransactionScope};
use crate::model::entity::Entity;

/// Which half of the delete protocol is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePhase {
    /// Owned row flagged with `deleted_by`/`deleted_date`, still present.
    Soft,
    /// Row physically removed.
    Hard,
}

/// Per-type lifecycle hooks. Every method defaults to a no-op.
///
/// Ownership defaults and soft-delete marking for owned types run before
/// the matching `before_*` hook.
pub trait EntityHooks: Send + Sync {
    fn before_insert(&self, _tx: &TxScope<'_>, _entity: &mut Entity) -> RepoResult<()> {
        Ok(())
    }

    fn after_insert(&self, _tx: &TxScope<'_>, _entity: &mut Entity) -> RepoResult<()> {
        Ok(())
    }

    fn before_update(&self, _tx: &TxScope<'_>, _entity: &mut Entity) -> RepoResult<()> {
        Ok(())
    }

    fn after_update(&self, _tx: &TxScope<'_>, _entity: &mut Entity) -> RepoResult<()> {
        Ok(())
    }

    fn before_delete(
        &self,
        _tx: &TxScope<'_>,
        _entity: &mut Entity,
        _phase: DeletePhase,
    ) -> RepoResult<()> {
        Ok(())
    }

    fn after_delete(
        &self,
        _tx: &TxScope<'_>,
        _entity: &Entity,
        _phase: DeletePhase,
    ) -> RepoResult<()> {
        Ok(())
    }
}

/// Hooks for types without lifecycle behavior of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}

/// Repository view bound to one open transaction.
pub struct TxScope<'a> {
    repo: &'a Repository,
    session: &'a Session,
}

impl<'a> TxScope<'a> {
    pub(crate) fn new(repo: &'a Repository, session: &'a Session) -> Self {
        Self { repo, session }
    }

    pub fn context(&self) -> &RepoContext {
        self.repo.context()
    }

    pub fn instance_for(&self, type_name: &str) -> RepoResult<Entity> {
        self.repo.instance_for(type_name)
    }

    pub fn instance_for_table(&self, table_name: &str) -> RepoResult<Entity> {
        self.repo.instance_for_table(table_name)
    }

    pub fn search(
        &self,
        filter: &Entity,
        mode: SearchMode,
        order_by: &str,
    ) -> RepoResult<Vec<Entity>> {
        self.repo
            .search_on(self.session.connection(), filter, mode, order_by)
    }

    pub fn insert(&self, entity: Entity) -> RepoResult<Entity> {
        self.repo.insert_in(self.session, entity)
    }

    pub fn update(&self, entity: Entity) -> RepoResult<Entity> {
        self.repo.update_in(self.session, entity)
    }

    pub fn delete(&self, entity: Entity) -> RepoResult<Entity> {
        self.repo.delete_in(self.session, entity)
    }

    pub fn object_by_id(&self, id: &str, include_deleted: bool) -> RepoResult<Option<Entity>> {
        self.repo
            .object_by_id_on(self.session.connection(), id, include_deleted)
    }

    /// The acting user's row, read inside this transaction.
    pub fn current_user(&self) -> RepoResult<Option<Entity>> {
        self.repo.current_user_on(self.session.connection())
    }
}
