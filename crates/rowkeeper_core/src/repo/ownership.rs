//! Ownership, audit and soft-delete defaults for owned entities.
//!
//! # Invariants
//! - An object with a resolvable parent (`father_id`, else `fk_obj_id`)
//!   takes the parent's `group_id` and `permissions`.
//! - Without a parent, `owner`/`group_id` default to the acting user and
//!   `permissions` to `rwx------`; caller-set values are kept.
//! - Audit fields always reflect the acting user and the current time.

use super::error::RepoResult;
use super::hooks::TxScope;
use crate::model::descriptor::{object_columns as col, DEFAULT_PERMISSIONS};
use crate::model::entity::{new_object_id, Entity};
use crate::model::value::{now_timestamp, Value};
use log::debug;

/// Group used for new objects: the acting user's `group_id`, else the first
/// group of the context.
pub fn acting_group_id(tx: &TxScope<'_>) -> RepoResult<Option<String>> {
    if let Some(user) = tx.current_user()? {
        if let Some(group_id) = user.non_empty_text(col::GROUP_ID) {
            return Ok(Some(group_id.to_string()));
        }
    }
    Ok(tx.context().group_ids.first().cloned())
}

/// Fills identity, ownership, audit and permission columns before INSERT.
pub fn apply_insert_defaults(tx: &TxScope<'_>, entity: &mut Entity) -> RepoResult<()> {
    if entity.non_empty_text(col::ID).is_none() {
        entity.set(col::ID, new_object_id());
    }

    let user_id = tx.context().user_id.clone();
    if !user_id.is_empty() {
        if entity.non_empty_text(col::OWNER).is_none() {
            entity.set(col::OWNER, user_id.as_str());
        }
        entity.set(col::CREATOR, user_id.as_str());
        entity.set(col::LAST_MODIFY, user_id.as_str());
    }
    if entity.non_empty_text(col::GROUP_ID).is_none() {
        if let Some(group_id) = acting_group_id(tx)? {
            entity.set(col::GROUP_ID, group_id);
        }
    }
    let now = now_timestamp();
    entity.set(col::CREATION_DATE, now);
    entity.set(col::LAST_MODIFY_DATE, now);

    match parent_of(tx, entity)? {
        Some(parent) => inherit_from(entity, &parent),
        None if entity.non_empty_text(col::FATHER_ID).is_none() => {
            entity.set(col::FATHER_ID, Value::Null)
        }
        None => {}
    }

    if entity.non_empty_text(col::PERMISSIONS).is_none() {
        entity.set(col::PERMISSIONS, DEFAULT_PERMISSIONS);
    }
    Ok(())
}

/// Stamps `last_modify`/`last_modify_date` before UPDATE.
pub fn touch_modified(tx: &TxScope<'_>, entity: &mut Entity) {
    if tx.context().has_user() {
        entity.set(col::LAST_MODIFY, tx.context().user_id.as_str());
    }
    entity.set(col::LAST_MODIFY_DATE, now_timestamp());
}

/// Sets the soft-delete markers.
pub fn mark_soft_deleted(tx: &TxScope<'_>, entity: &mut Entity) {
    let deleted_by = if tx.context().has_user() {
        Value::from(tx.context().user_id.as_str())
    } else {
        Value::Null
    };
    entity.set(col::DELETED_BY, deleted_by);
    entity.set(col::DELETED_DATE, now_timestamp());
}

/// Soft-deleted parents still pass on their group and permissions.
fn parent_of(tx: &TxScope<'_>, entity: &Entity) -> RepoResult<Option<Entity>> {
    if let Some(father_id) = entity.non_empty_text(col::FATHER_ID) {
        return tx.object_by_id(father_id, true);
    }
    if entity.descriptor().column(col::FK_OBJ_ID).is_some() {
        if let Some(fk_obj_id) = entity.non_empty_text(col::FK_OBJ_ID) {
            return tx.object_by_id(fk_obj_id, true);
        }
    }
    Ok(None)
}

fn inherit_from(entity: &mut Entity, parent: &Entity) {
    let Some(view) = parent.as_object() else {
        return;
    };
    debug!(
        "event=object_inherit module=repo status=ok type={} parent_type={}",
        entity.type_name(),
        parent.type_name()
    );
    if let Some(parent_id) = view.id() {
        entity.set(col::FATHER_ID, parent_id);
    }
    if let Some(group_id) = view.group_id() {
        entity.set(col::GROUP_ID, group_id);
    }
    let permissions = view.permissions();
    if !permissions.is_empty() {
        entity.set(col::PERMISSIONS, permissions);
    }
}
