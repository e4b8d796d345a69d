//! Catalog of entity types.
//!
//! # Responsibility
//! - Index descriptors and their lifecycle hooks by type name and table name.
//! - Resolve foreign-key targets once every type is registered.
//! - Hand out blank instances, never shared prototypes.
//!
//! # Invariants
//! - Type names are unique.
//! - The last registration for a table name wins table-name lookups.
//! - The registry is built once at startup and then shared read-only.

use crate::model::descriptor::{DescriptorError, EntityDescriptor, EntityKind, OBJECTS_TABLE};
use crate::model::entity::Entity;
use crate::repo::hooks::{EntityHooks, NoHooks};
use log::{debug, error};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Descriptor(DescriptorError),
    DuplicateType(String),
    UnknownType(String),
    UnknownTable(String),
    UnresolvedForeignKey {
        type_name: String,
        column: String,
        ref_table: String,
    },
    UnknownReferencedColumn {
        type_name: String,
        column: String,
        ref_table: String,
        ref_column: String,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Descriptor(err) => write!(f, "{err}"),
            Self::DuplicateType(name) => write!(f, "entity type `{name}` is already registered"),
            Self::UnknownType(name) => write!(f, "unknown entity type `{name}`"),
            Self::UnknownTable(name) => write!(f, "no entity type is registered for table `{name}`"),
            Self::UnresolvedForeignKey {
                type_name,
                column,
                ref_table,
            } => write!(
                f,
                "{type_name}.{column} references unregistered table `{ref_table}`"
            ),
            Self::UnknownReferencedColumn {
                type_name,
                column,
                ref_table,
                ref_column,
            } => write!(
                f,
                "{type_name}.{column} references undeclared column `{ref_table}.{ref_column}`"
            ),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Descriptor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DescriptorError> for RegistryError {
    fn from(value: DescriptorError) -> Self {
        Self::Descriptor(value)
    }
}

struct RegisteredType {
    descriptor: Arc<EntityDescriptor>,
    hooks: Arc<dyn EntityHooks>,
}

/// Process-wide catalog of entity types.
#[derive(Default)]
pub struct EntityRegistry {
    types: Vec<RegisteredType>,
    by_type: HashMap<String, usize>,
    by_table: HashMap<String, usize>,
    /// Type name -> type names it references through foreign keys.
    references: HashMap<String, Vec<String>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type with its lifecycle hooks.
    pub fn register(
        &mut self,
        descriptor: EntityDescriptor,
        hooks: Arc<dyn EntityHooks>,
    ) -> Result<(), RegistryError> {
        let type_name = descriptor.type_name().to_string();
        if self.by_type.contains_key(&type_name) {
            return Err(RegistryError::DuplicateType(type_name));
        }
        let index = self.types.len();
        self.by_table
            .insert(descriptor.table_name().to_string(), index);
        self.by_type.insert(type_name, index);
        self.types.push(RegisteredType {
            descriptor: Arc::new(descriptor),
            hooks,
        });
        Ok(())
    }

    /// Registers a type without lifecycle hooks of its own.
    pub fn register_plain(&mut self, descriptor: EntityDescriptor) -> Result<(), RegistryError> {
        self.register(descriptor, Arc::new(NoHooks))
    }

    /// Resolves every foreign key to a registered type.
    ///
    /// Call once after all registrations; a failure is a startup
    /// misconfiguration.
    pub fn process_foreign_keys(&mut self) -> Result<(), RegistryError> {
        let mut references = HashMap::new();
        for registered in &self.types {
            let descriptor = &registered.descriptor;
            let mut targets: Vec<String> = Vec::new();
            for foreign_key in descriptor.foreign_keys() {
                let target = self
                    .by_table
                    .get(&foreign_key.ref_table)
                    .map(|index| &self.types[*index].descriptor)
                    .ok_or_else(|| {
                        let err = RegistryError::UnresolvedForeignKey {
                            type_name: descriptor.type_name().to_string(),
                            column: foreign_key.column.clone(),
                            ref_table: foreign_key.ref_table.clone(),
                        };
                        error!(
                            "event=registry_resolve module=registry status=error error={}",
                            err
                        );
                        err
                    })?;
                if target.column(&foreign_key.ref_column).is_none() {
                    return Err(RegistryError::UnknownReferencedColumn {
                        type_name: descriptor.type_name().to_string(),
                        column: foreign_key.column.clone(),
                        ref_table: foreign_key.ref_table.clone(),
                        ref_column: foreign_key.ref_column.clone(),
                    });
                }
                let target_name = target.type_name().to_string();
                if !targets.contains(&target_name) {
                    targets.push(target_name);
                }
            }
            references.insert(descriptor.type_name().to_string(), targets);
        }
        self.references = references;
        debug!(
            "event=registry_resolve module=registry status=ok types={}",
            self.types.len()
        );
        Ok(())
    }

    /// Type names `type_name` references, available after
    /// `process_foreign_keys`.
    pub fn referenced_types(&self, type_name: &str) -> &[String] {
        self.references
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn descriptor(&self, type_name: &str) -> Result<&Arc<EntityDescriptor>, RegistryError> {
        self.by_type
            .get(type_name)
            .map(|index| &self.types[*index].descriptor)
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))
    }

    pub fn descriptor_for_table(
        &self,
        table_name: &str,
    ) -> Result<&Arc<EntityDescriptor>, RegistryError> {
        self.by_table
            .get(table_name)
            .map(|index| &self.types[*index].descriptor)
            .ok_or_else(|| RegistryError::UnknownTable(table_name.to_string()))
    }

    /// Blank instance of a registered type.
    pub fn instance_by_type_name(&self, type_name: &str) -> Result<Entity, RegistryError> {
        self.descriptor(type_name)
            .map(|descriptor| Entity::new(Arc::clone(descriptor)))
    }

    /// Blank instance of the type last registered for `table_name`.
    pub fn instance_by_table_name(&self, table_name: &str) -> Result<Entity, RegistryError> {
        self.descriptor_for_table(table_name)
            .map(|descriptor| Entity::new(Arc::clone(descriptor)))
    }

    /// Hooks for a type; types registered elsewhere get no-op hooks.
    pub fn hooks_for(&self, type_name: &str) -> Arc<dyn EntityHooks> {
        self.by_type
            .get(type_name)
            .map(|index| Arc::clone(&self.types[*index].hooks))
            .unwrap_or_else(|| Arc::new(NoHooks))
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.types.iter().map(|registered| &registered.descriptor)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.descriptors()
            .map(|descriptor| descriptor.type_name())
            .collect()
    }

    /// Owned descriptors, one per table, with the base objects table last.
    ///
    /// Each table is represented by the type that wins table-name lookups.
    pub fn owned_descriptors(&self) -> Vec<&Arc<EntityDescriptor>> {
        let mut seen_tables: Vec<&str> = Vec::new();
        let mut owned: Vec<&Arc<EntityDescriptor>> = Vec::new();
        let mut base = None;
        for registered in self.descriptors() {
            let table = registered.table_name();
            if seen_tables.contains(&table) {
                continue;
            }
            seen_tables.push(table);
            let Some(descriptor) = self
                .by_table
                .get(table)
                .map(|index| &self.types[*index].descriptor)
            else {
                continue;
            };
            if descriptor.kind() != EntityKind::Owned {
                continue;
            }
            if descriptor.table_name() == OBJECTS_TABLE {
                base = Some(descriptor);
            } else {
                owned.push(descriptor);
            }
        }
        owned.extend(base);
        owned
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityRegistry, RegistryError};
    use crate::model::column::{Column, ForeignKey};
    use crate::model::descriptor::EntityDescriptor;

    fn table(type_name: &str, table_name: &str, fks: Vec<ForeignKey>) -> EntityDescriptor {
        let mut columns = vec![Column::new("id", "varchar(16)", &["NOT NULL"])];
        for fk in &fks {
            columns.push(Column::new(&fk.column, "varchar(16)", &[]));
        }
        EntityDescriptor::plain(type_name, table_name, columns, &["id"], fks).unwrap()
    }

    #[test]
    fn instances_are_blank_clones() {
        let mut registry = EntityRegistry::new();
        registry.register_plain(table("Thing", "things", vec![])).unwrap();

        let mut first = registry.instance_by_type_name("Thing").unwrap();
        first.set("id", "t1");
        let second = registry.instance_by_type_name("Thing").unwrap();
        assert!(!second.has("id"));
        assert!(matches!(
            registry.instance_by_type_name("Missing"),
            Err(RegistryError::UnknownType(_))
        ));
    }

    #[test]
    fn last_table_registration_wins() {
        let mut registry = EntityRegistry::new();
        registry.register_plain(table("Legacy", "things", vec![])).unwrap();
        registry.register_plain(table("Thing", "things", vec![])).unwrap();
        assert_eq!(
            registry.instance_by_table_name("things").unwrap().type_name(),
            "Thing"
        );
        assert_eq!(
            registry.register_plain(table("Thing", "other", vec![])),
            Err(RegistryError::DuplicateType("Thing".to_string()))
        );
    }

    #[test]
    fn owned_listing_agrees_with_table_lookup() {
        let mut registry = EntityRegistry::new();
        registry
            .register_plain(EntityDescriptor::object("DBObject", "objects", vec![], vec![]).unwrap())
            .unwrap();
        registry
            .register_plain(EntityDescriptor::object("Task", "tasks", vec![], vec![]).unwrap())
            .unwrap();
        registry
            .register_plain(
                EntityDescriptor::object(
                    "DueTask",
                    "tasks",
                    vec![Column::new("due", "datetime", &[])],
                    vec![],
                )
                .unwrap(),
            )
            .unwrap();

        let owned: Vec<&str> = registry
            .owned_descriptors()
            .iter()
            .map(|descriptor| descriptor.type_name())
            .collect();
        assert_eq!(owned, vec!["DueTask", "DBObject"]);
        assert_eq!(
            registry.instance_by_table_name("tasks").unwrap().type_name(),
            "DueTask"
        );
    }

    #[test]
    fn foreign_keys_resolve_to_registered_types() {
        let mut registry = EntityRegistry::new();
        registry.register_plain(table("Parent", "parents", vec![])).unwrap();
        registry
            .register_plain(table(
                "Child",
                "children",
                vec![ForeignKey::new("parent_id", "parents", "id")],
            ))
            .unwrap();
        registry.process_foreign_keys().unwrap();
        assert_eq!(registry.referenced_types("Child"), ["Parent".to_string()]);
        assert!(registry.referenced_types("Parent").is_empty());
    }

    #[test]
    fn unresolved_foreign_keys_fail() {
        let mut registry = EntityRegistry::new();
        registry
            .register_plain(table(
                "Orphan",
                "orphans",
                vec![ForeignKey::new("parent_id", "nowhere", "id")],
            ))
            .unwrap();
        assert!(matches!(
            registry.process_foreign_keys(),
            Err(RegistryError::UnresolvedForeignKey { .. })
        ));

        let mut registry = EntityRegistry::new();
        registry.register_plain(table("Parent", "parents", vec![])).unwrap();
        registry
            .register_plain(table(
                "Child",
                "children",
                vec![ForeignKey::new("parent_id", "parents", "uuid")],
            ))
            .unwrap();
        assert!(matches!(
            registry.process_foreign_keys(),
            Err(RegistryError::UnknownReferencedColumn { .. })
        ));
    }
}
