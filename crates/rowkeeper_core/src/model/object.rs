//! Ownership and permission semantics of owned entities.
//!
//! # Invariants
//! - A permission string is exactly nine characters, one `rwx` triad per
//!   subject class (owner, group, other). Anything else denies all access.
//! - `deleted_date` set and non-NULL is the only soft-delete flag.

use super::descriptor::object_columns;
use super::entity::Entity;
use super::value::Value;

/// Subject class addressed by a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Owner,
    Group,
    Other,
}

impl Subject {
    /// Maps the legacy kind letters: `U` owner, `G` group, anything else other.
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "U" => Self::Owner,
            "G" => Self::Group,
            _ => Self::Other,
        }
    }

    fn offset(self) -> usize {
        match self {
            Self::Owner => 0,
            Self::Group => 3,
            Self::Other => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    fn slot(self) -> (usize, u8) {
        match self {
            Self::Read => (0, b'r'),
            Self::Write => (1, b'w'),
            Self::Execute => (2, b'x'),
        }
    }
}

/// Returns whether `permissions` grants `access` to `subject`.
pub fn permits(permissions: &str, subject: Subject, access: Access) -> bool {
    let bytes = permissions.as_bytes();
    if bytes.len() != 9 {
        return false;
    }
    let (slot, letter) = access.slot();
    bytes[subject.offset() + slot] == letter
}

/// Read-only object view over an owned entity.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRef<'a> {
    entity: &'a Entity,
}

impl<'a> ObjectRef<'a> {
    pub(crate) fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    pub fn id(&self) -> Option<&'a str> {
        self.entity.non_empty_text(object_columns::ID)
    }

    pub fn owner(&self) -> Option<&'a str> {
        self.entity.non_empty_text(object_columns::OWNER)
    }

    pub fn group_id(&self) -> Option<&'a str> {
        self.entity.non_empty_text(object_columns::GROUP_ID)
    }

    pub fn father_id(&self) -> Option<&'a str> {
        self.entity.non_empty_text(object_columns::FATHER_ID)
    }

    pub fn permissions(&self) -> &'a str {
        self.entity
            .non_empty_text(object_columns::PERMISSIONS)
            .unwrap_or("")
    }

    pub fn has_deleted_date(&self) -> bool {
        match self.entity.get(object_columns::DELETED_DATE) {
            None | Some(Value::Null) => false,
            Some(Value::Text(text)) => !text.is_empty(),
            Some(_) => true,
        }
    }

    pub fn can_read(&self, kind: &str) -> bool {
        permits(self.permissions(), Subject::from_kind(kind), Access::Read)
    }

    pub fn can_write(&self, kind: &str) -> bool {
        permits(self.permissions(), Subject::from_kind(kind), Access::Write)
    }

    pub fn can_execute(&self, kind: &str) -> bool {
        permits(self.permissions(), Subject::from_kind(kind), Access::Execute)
    }
}

#[cfg(test)]
mod tests {
    use super::{permits, Access, Subject};
    use crate::model::descriptor::EntityDescriptor;
    use crate::model::entity::Entity;
    use crate::model::value::Value;
    use std::sync::Arc;

    fn object(permissions: &str) -> Entity {
        let descriptor = EntityDescriptor::object("DBObject", "objects", vec![], vec![]).unwrap();
        let mut entity = Entity::new(Arc::new(descriptor));
        entity.set("permissions", permissions);
        entity
    }

    #[test]
    fn owner_only_permissions_decode() {
        let entity = object("rwx------");
        let view = entity.as_object().unwrap();
        assert!(view.can_read("U"));
        assert!(view.can_write("U"));
        assert!(!view.can_write("G"));
        assert!(!view.can_execute("O"));
    }

    #[test]
    fn group_read_permissions_decode() {
        let entity = object("rwxr-----");
        let view = entity.as_object().unwrap();
        assert!(view.can_read("G"));
        assert!(!view.can_write("G"));
        assert!(!view.can_read("anyone"));
    }

    #[test]
    fn malformed_permissions_deny_everything() {
        assert!(!permits("rwx", Subject::Owner, Access::Read));
        assert!(!permits("rwxrwxrwxr", Subject::Owner, Access::Read));
        let entity = object("");
        assert!(!entity.as_object().unwrap().can_read("U"));
    }

    #[test]
    fn deleted_date_is_the_soft_delete_flag() {
        let mut entity = object("rwx------");
        assert!(!entity.as_object().unwrap().has_deleted_date());
        entity.set("deleted_date", Value::Null);
        assert!(!entity.as_object().unwrap().has_deleted_date());
        entity.set("deleted_date", "2024-01-01 00:00:00");
        assert!(entity.as_object().unwrap().has_deleted_date());
    }
}
