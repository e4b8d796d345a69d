//! Immutable table metadata.
//!
//! # Responsibility
//! - Describe one entity type: table, columns, keys, foreign keys.
//! - Validate the description once, at construction.
//!
//! # Invariants
//! - Every primary-key and foreign-key column appears in the column list.
//! - Type, table and column names are plain SQL identifiers, so repository
//!   code may interpolate them without quoting.
//! - Associations carry at least two foreign keys and a non-empty key.

use super::column::{Column, ForeignKey};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Table name of the permission-bearing base type.
pub const OBJECTS_TABLE: &str = "objects";
/// Table holding users; owners, creators and modifiers reference it.
pub const USERS_TABLE: &str = "users";
/// Table holding groups; object groups reference it.
pub const GROUPS_TABLE: &str = "groups";
/// Type name of the permission-bearing base type.
pub const BASE_OBJECT_TYPE: &str = "DBObject";
/// Default permission string for new objects: owner full access only.
pub const DEFAULT_PERMISSIONS: &str = "rwx------";

/// Column names shared by every owned entity.
pub mod object_columns {
    pub const ID: &str = "id";
    pub const OWNER: &str = "owner";
    pub const GROUP_ID: &str = "group_id";
    pub const PERMISSIONS: &str = "permissions";
    pub const CREATOR: &str = "creator";
    pub const CREATION_DATE: &str = "creation_date";
    pub const LAST_MODIFY: &str = "last_modify";
    pub const LAST_MODIFY_DATE: &str = "last_modify_date";
    pub const DELETED_BY: &str = "deleted_by";
    pub const DELETED_DATE: &str = "deleted_date";
    pub const FATHER_ID: &str = "father_id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    /// Optional polymorphic parent reference used by some subtypes.
    pub const FK_OBJ_ID: &str = "fk_obj_id";

    pub const ALL: &[&str] = &[
        ID,
        OWNER,
        GROUP_ID,
        PERMISSIONS,
        CREATOR,
        CREATION_DATE,
        LAST_MODIFY,
        LAST_MODIFY_DATE,
        DELETED_BY,
        DELETED_DATE,
        FATHER_ID,
        NAME,
        DESCRIPTION,
    ];
}

/// Persistence semantics of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    /// Plain row: hard delete, no ownership.
    Plain,
    /// Permission-bearing object: ownership, audit fields, soft-then-hard delete.
    Owned,
    /// Join row with a composite key over its foreign keys: always hard delete.
    Association,
}

/// Invalid entity description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    InvalidIdentifier(String),
    DuplicateColumn {
        type_name: String,
        column: String,
    },
    MissingKeyColumn {
        type_name: String,
        column: String,
    },
    MissingForeignKeyColumn {
        type_name: String,
        column: String,
    },
    MissingPrimaryKey(String),
    NotEnoughForeignKeys {
        type_name: String,
        found: usize,
    },
    UnknownOrderColumn {
        type_name: String,
        column: String,
    },
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "invalid SQL identifier `{name}`"),
            Self::DuplicateColumn { type_name, column } => {
                write!(f, "{type_name}: duplicate column `{column}`")
            }
            Self::MissingKeyColumn { type_name, column } => {
                write!(f, "{type_name}: primary key column `{column}` is not declared")
            }
            Self::MissingForeignKeyColumn { type_name, column } => {
                write!(f, "{type_name}: foreign key column `{column}` is not declared")
            }
            Self::MissingPrimaryKey(type_name) => {
                write!(f, "{type_name}: a primary key is required")
            }
            Self::NotEnoughForeignKeys { type_name, found } => write!(
                f,
                "{type_name}: associations need at least two foreign keys, found {found}"
            ),
            Self::UnknownOrderColumn { type_name, column } => {
                write!(f, "{type_name}: order column `{column}` is not declared")
            }
        }
    }
}

impl Error for DescriptorError {}

/// Static description of one entity type and its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    type_name: String,
    table_name: String,
    kind: EntityKind,
    columns: Vec<Column>,
    keys: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
    order_by: Vec<String>,
}

impl EntityDescriptor {
    /// Describes a plain table.
    pub fn plain(
        type_name: &str,
        table_name: &str,
        columns: Vec<Column>,
        keys: &[&str],
        foreign_keys: Vec<ForeignKey>,
    ) -> Result<Self, DescriptorError> {
        Self::build(
            type_name,
            table_name,
            EntityKind::Plain,
            columns,
            keys,
            foreign_keys,
        )
    }

    /// Describes a join table. The first foreign key is the "from" side and
    /// the second the "to" side.
    pub fn association(
        type_name: &str,
        table_name: &str,
        columns: Vec<Column>,
        keys: &[&str],
        foreign_keys: Vec<ForeignKey>,
    ) -> Result<Self, DescriptorError> {
        if keys.is_empty() {
            return Err(DescriptorError::MissingPrimaryKey(type_name.to_string()));
        }
        if foreign_keys.len() < 2 {
            return Err(DescriptorError::NotEnoughForeignKeys {
                type_name: type_name.to_string(),
                found: foreign_keys.len(),
            });
        }
        Self::build(
            type_name,
            table_name,
            EntityKind::Association,
            columns,
            keys,
            foreign_keys,
        )
    }

    /// Describes a permission-bearing object table.
    ///
    /// The shared object columns and their foreign keys come first; `extra`
    /// columns and foreign keys are appended in declaration order.
    pub fn object(
        type_name: &str,
        table_name: &str,
        extra_columns: Vec<Column>,
        extra_foreign_keys: Vec<ForeignKey>,
    ) -> Result<Self, DescriptorError> {
        let mut columns = base_object_columns();
        columns.extend(extra_columns);
        let mut foreign_keys = base_object_foreign_keys();
        foreign_keys.extend(extra_foreign_keys);
        Self::build(
            type_name,
            table_name,
            EntityKind::Owned,
            columns,
            &[object_columns::ID],
            foreign_keys,
        )
    }

    /// Replaces the default ordering (primary key) used by listings.
    pub fn with_order_by(mut self, columns: &[&str]) -> Result<Self, DescriptorError> {
        for column in columns {
            if self.column(column).is_none() {
                return Err(DescriptorError::UnknownOrderColumn {
                    type_name: self.type_name.clone(),
                    column: column.to_string(),
                });
            }
        }
        self.order_by = columns.iter().map(|column| column.to_string()).collect();
        Ok(self)
    }

    fn build(
        type_name: &str,
        table_name: &str,
        kind: EntityKind,
        columns: Vec<Column>,
        keys: &[&str],
        foreign_keys: Vec<ForeignKey>,
    ) -> Result<Self, DescriptorError> {
        ensure_identifier(type_name)?;
        ensure_identifier(table_name)?;

        let mut seen = HashSet::new();
        for column in &columns {
            ensure_identifier(&column.name)?;
            if !seen.insert(column.name.as_str()) {
                return Err(DescriptorError::DuplicateColumn {
                    type_name: type_name.to_string(),
                    column: column.name.clone(),
                });
            }
        }
        for key in keys {
            if !seen.contains(key) {
                return Err(DescriptorError::MissingKeyColumn {
                    type_name: type_name.to_string(),
                    column: key.to_string(),
                });
            }
        }
        for foreign_key in &foreign_keys {
            ensure_identifier(&foreign_key.ref_table)?;
            ensure_identifier(&foreign_key.ref_column)?;
            if !seen.contains(foreign_key.column.as_str()) {
                return Err(DescriptorError::MissingForeignKeyColumn {
                    type_name: type_name.to_string(),
                    column: foreign_key.column.clone(),
                });
            }
        }

        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        Ok(Self {
            type_name: type_name.to_string(),
            table_name: table_name.to_string(),
            kind,
            columns,
            order_by: keys.clone(),
            keys,
            foreign_keys,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// True for the owned base type that other owned tables inherit from.
    pub fn is_base_object(&self) -> bool {
        self.kind == EntityKind::Owned && self.table_name == OBJECTS_TABLE
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Declared SQL type, or an empty string for unknown columns.
    pub fn column_type(&self, name: &str) -> &str {
        self.column(name)
            .map_or("", |column| column.sql_type.as_str())
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// First foreign key declared on `column`.
    pub fn foreign_key_definition(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|foreign_key| foreign_key.column == column)
    }

    pub fn foreign_keys_for_table(&self, table_name: &str) -> Vec<&ForeignKey> {
        self.foreign_keys
            .iter()
            .filter(|foreign_key| foreign_key.ref_table == table_name)
            .collect()
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.keys.iter().any(|key| key == column)
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|foreign_key| foreign_key.column == column)
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn order_by_string(&self) -> String {
        self.order_by.join(", ")
    }

    /// Referenced table of the "from" side of an association.
    pub fn from_table(&self) -> Option<&str> {
        match self.kind {
            EntityKind::Association => self
                .foreign_keys
                .first()
                .map(|foreign_key| foreign_key.ref_table.as_str()),
            _ => None,
        }
    }

    /// Referenced table of the "to" side of an association.
    pub fn to_table(&self) -> Option<&str> {
        match self.kind {
            EntityKind::Association => self
                .foreign_keys
                .get(1)
                .map(|foreign_key| foreign_key.ref_table.as_str()),
            _ => None,
        }
    }
}

/// Returns true when `name` can be interpolated into SQL as a bare identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

fn ensure_identifier(name: &str) -> Result<(), DescriptorError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(DescriptorError::InvalidIdentifier(name.to_string()))
    }
}

fn base_object_columns() -> Vec<Column> {
    use object_columns::*;
    vec![
        Column::new(ID, "varchar(16)", &["NOT NULL"]),
        Column::new(OWNER, "varchar(16)", &["NOT NULL"]),
        Column::new(GROUP_ID, "varchar(16)", &["NOT NULL"]),
        Column::new(PERMISSIONS, "char(9)", &["NOT NULL", "DEFAULT 'rwx------'"]),
        Column::new(CREATOR, "varchar(16)", &["NOT NULL"]),
        Column::new(CREATION_DATE, "datetime", &["DEFAULT NULL"]),
        Column::new(LAST_MODIFY, "varchar(16)", &["NOT NULL"]),
        Column::new(LAST_MODIFY_DATE, "datetime", &["DEFAULT NULL"]),
        Column::new(DELETED_BY, "varchar(16)", &["DEFAULT NULL"]),
        Column::new(DELETED_DATE, "datetime", &["DEFAULT NULL"]),
        Column::new(FATHER_ID, "varchar(16)", &["DEFAULT NULL"]),
        Column::new(NAME, "varchar(255)", &["NOT NULL"]),
        Column::new(DESCRIPTION, "text", &["DEFAULT NULL"]),
    ]
}

fn base_object_foreign_keys() -> Vec<ForeignKey> {
    use object_columns::*;
    vec![
        ForeignKey::new(OWNER, USERS_TABLE, ID),
        ForeignKey::new(GROUP_ID, GROUPS_TABLE, ID),
        ForeignKey::new(CREATOR, USERS_TABLE, ID),
        ForeignKey::new(LAST_MODIFY, USERS_TABLE, ID),
        ForeignKey::new(DELETED_BY, USERS_TABLE, ID),
        ForeignKey::new(FATHER_ID, OBJECTS_TABLE, ID),
    ]
}
