//! Lifecycle hooks of users and groups.
//!
//! # Invariants
//! - Every user owns exactly one personal group, named `<login>'s group`,
//!   and is a member of it.
//! - Logins and group names are unique; duplicates fail with
//!   `RepoError::AlreadyExists`.
//! - Deleting a user or a group removes its membership rows first.

use super::tables::{
    group_columns as grp, membership_columns as mem, user_columns as usr, USERS_GROUPS_TABLE,
};
use crate::model::descriptor::{GROUPS_TABLE, USERS_TABLE};
use crate::model::entity::{new_object_id, Entity};
use crate::repo::{DeletePhase, EntityHooks, RepoError, RepoResult, SearchMode, TxScope};
use log::debug;

/// Metadata key listing extra group ids of a user.
pub const GROUP_IDS_METADATA: &str = "group_ids";
/// Metadata key listing member user ids of a group.
pub const USER_IDS_METADATA: &str = "user_ids";

pub struct UserHooks;

pub struct GroupHooks;

impl EntityHooks for UserHooks {
    fn before_insert(&self, tx: &TxScope<'_>, user: &mut Entity) -> RepoResult<()> {
        let login = user
            .non_empty_text(usr::LOGIN)
            .ok_or_else(|| RepoError::Validation("user login is required".to_string()))?
            .to_string();

        let mut existing = user.blank();
        existing.set(usr::LOGIN, login.as_str());
        if !tx.search(&existing, SearchMode::exact(), usr::LOGIN)?.is_empty() {
            return Err(RepoError::AlreadyExists(format!(
                "user with login '{login}' already exists"
            )));
        }

        let mut group = tx.instance_for_table(GROUPS_TABLE)?;
        group.set(grp::NAME, format!("{login}'s group"));
        group.set(grp::DESCRIPTION, format!("Personal group for {login}"));
        let group = tx.insert(group)?;

        if user.non_empty_text(usr::ID).is_none() {
            user.set(usr::ID, new_object_id());
        }
        if let Some(group_id) = group.get(grp::ID) {
            user.set(usr::GROUP_ID, group_id.clone());
        }
        Ok(())
    }

    fn after_insert(&self, tx: &TxScope<'_>, user: &mut Entity) -> RepoResult<()> {
        let user_id = required_text(user, usr::ID)?;
        let personal_group = required_text(user, usr::GROUP_ID)?;
        add_membership(tx, &user_id, &personal_group)?;

        for group_id in user
            .metadata_strings(GROUP_IDS_METADATA)
            .unwrap_or_default()
        {
            if group_id != personal_group {
                add_membership(tx, &user_id, &group_id)?;
            }
        }
        Ok(())
    }

    fn after_update(&self, tx: &TxScope<'_>, user: &mut Entity) -> RepoResult<()> {
        let Some(group_ids) = user.metadata_strings(GROUP_IDS_METADATA) else {
            return Ok(());
        };
        let user_id = required_text(user, usr::ID)?;
        remove_memberships(tx, mem::USER_ID, &user_id)?;

        let mut wanted: Vec<String> = Vec::with_capacity(group_ids.len() + 1);
        if let Some(personal_group) = stored_personal_group(tx, user)? {
            wanted.push(personal_group);
        }
        for group_id in group_ids {
            if !wanted.contains(&group_id) {
                wanted.push(group_id);
            }
        }
        for group_id in &wanted {
            add_membership(tx, &user_id, group_id)?;
        }
        Ok(())
    }

    fn before_delete(
        &self,
        tx: &TxScope<'_>,
        user: &mut Entity,
        _phase: DeletePhase,
    ) -> RepoResult<()> {
        let user_id = required_text(user, usr::ID)?;
        remove_memberships(tx, mem::USER_ID, &user_id)?;

        if let Some(group_id) = stored_personal_group(tx, user)? {
            let mut filter = tx.instance_for_table(GROUPS_TABLE)?;
            filter.set(grp::ID, group_id.as_str());
            for group in tx.search(&filter, SearchMode::exact(), "")? {
                tx.delete(group)?;
            }
            debug!(
                "event=personal_group_removed module=builtin status=ok user_id={}",
                user_id
            );
        }
        Ok(())
    }
}

impl EntityHooks for GroupHooks {
    fn before_insert(&self, tx: &TxScope<'_>, group: &mut Entity) -> RepoResult<()> {
        if group.non_empty_text(grp::ID).is_none() {
            group.set(grp::ID, new_object_id());
        }
        let name = group
            .non_empty_text(grp::NAME)
            .ok_or_else(|| RepoError::Validation("group name is required".to_string()))?
            .to_string();

        let mut existing = group.blank();
        existing.set(grp::NAME, name.as_str());
        if !tx.search(&existing, SearchMode::exact(), grp::NAME)?.is_empty() {
            return Err(RepoError::AlreadyExists(format!(
                "group with name '{name}' already exists"
            )));
        }
        Ok(())
    }

    fn after_update(&self, tx: &TxScope<'_>, group: &mut Entity) -> RepoResult<()> {
        let Some(user_ids) = group.metadata_strings(USER_IDS_METADATA) else {
            return Ok(());
        };
        let group_id = required_text(group, grp::ID)?;
        remove_memberships(tx, mem::GROUP_ID, &group_id)?;
        let mut added: Vec<&str> = Vec::with_capacity(user_ids.len());
        for user_id in &user_ids {
            if !added.contains(&user_id.as_str()) {
                add_membership(tx, user_id, &group_id)?;
                added.push(user_id);
            }
        }
        Ok(())
    }

    fn before_delete(
        &self,
        tx: &TxScope<'_>,
        group: &mut Entity,
        _phase: DeletePhase,
    ) -> RepoResult<()> {
        let group_id = required_text(group, grp::ID)?;
        remove_memberships(tx, mem::GROUP_ID, &group_id)
    }
}

fn required_text(entity: &Entity, column: &str) -> RepoResult<String> {
    entity
        .non_empty_text(column)
        .map(str::to_string)
        .ok_or_else(|| RepoError::MissingPrimaryKey(entity.type_name().to_string()))
}

/// Personal group id of `user`, read from the stored row when not set.
fn stored_personal_group(tx: &TxScope<'_>, user: &Entity) -> RepoResult<Option<String>> {
    if let Some(group_id) = user.non_empty_text(usr::GROUP_ID) {
        return Ok(Some(group_id.to_string()));
    }
    let Some(user_id) = user.non_empty_text(usr::ID) else {
        return Ok(None);
    };
    let mut filter = tx.instance_for_table(USERS_TABLE)?;
    filter.set(usr::ID, user_id);
    Ok(tx
        .search(&filter, SearchMode::exact(), "")?
        .first()
        .and_then(|stored| stored.non_empty_text(usr::GROUP_ID))
        .map(str::to_string))
}

fn add_membership(tx: &TxScope<'_>, user_id: &str, group_id: &str) -> RepoResult<()> {
    let mut link = tx.instance_for_table(USERS_GROUPS_TABLE)?;
    link.set(mem::USER_ID, user_id);
    link.set(mem::GROUP_ID, group_id);
    tx.insert(link)?;
    Ok(())
}

fn remove_memberships(tx: &TxScope<'_>, column: &str, id: &str) -> RepoResult<()> {
    let mut filter = tx.instance_for_table(USERS_GROUPS_TABLE)?;
    filter.set(column, id);
    for link in tx.search(&filter, SearchMode::exact(), "")? {
        tx.delete(link)?;
    }
    Ok(())
}
