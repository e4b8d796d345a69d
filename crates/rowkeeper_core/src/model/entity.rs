//! Entity instances: a descriptor plus a mutable value store.
//!
//! # Responsibility
//! - Hold column values for one row, existing or not yet inserted.
//! - Carry hook-only metadata that is never written to the database.
//!
//! # Invariants
//! - An unset column is absent from the value store; `Value::Null` is an
//!   explicit NULL.
//! - `is_new()` holds iff no primary-key column is set.
//! - Metadata never reaches SQL.

use super::column::ForeignKey;
use super::descriptor::{EntityDescriptor, EntityKind};
use super::object::ObjectRef;
use super::value::{Value, ValueError};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

/// Generates a random 16-hex-character identifier.
pub fn new_object_id() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    let mut id = String::with_capacity(16);
    for index in 0..8 {
        let _ = write!(id, "{:02x}", bytes[index] ^ bytes[index + 8]);
    }
    id
}

/// One row of an entity type.
#[derive(Debug, Clone)]
pub struct Entity {
    descriptor: Arc<EntityDescriptor>,
    values: BTreeMap<String, Value>,
    metadata: BTreeMap<String, JsonValue>,
}

#[derive(Serialize)]
struct EntityJson<'a> {
    data: &'a BTreeMap<String, Value>,
    metadata: &'a BTreeMap<String, JsonValue>,
}

impl Entity {
    /// Creates a blank instance with an empty value store.
    pub fn new(descriptor: Arc<EntityDescriptor>) -> Self {
        Self {
            descriptor,
            values: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Blank instance of the same type.
    pub fn blank(&self) -> Self {
        Self::new(Arc::clone(&self.descriptor))
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub(crate) fn descriptor_arc(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.type_name()
    }

    pub fn table_name(&self) -> &str {
        self.descriptor.table_name()
    }

    pub fn kind(&self) -> EntityKind {
        self.descriptor.kind()
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.values.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn has(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Removes a column from the value store, making it unset again.
    pub fn unset(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Text value of a column; `None` when unset or NULL.
    pub fn text(&self, column: &str) -> Result<Option<&str>, ValueError> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_text().map(Some),
        }
    }

    /// Non-empty text value of a column.
    pub fn non_empty_text(&self, column: &str) -> Option<&str> {
        match self.text(column) {
            Ok(Some(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Owned copy of the value store.
    pub fn all_values(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }

    /// Names of set columns, sorted.
    pub fn value_keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<JsonValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    pub fn all_metadata(&self) -> BTreeMap<String, JsonValue> {
        self.metadata.clone()
    }

    /// Reads a metadata entry as a list of strings, e.g. `group_ids`.
    pub fn metadata_strings(&self, key: &str) -> Option<Vec<String>> {
        let items = self.metadata.get(key)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        )
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.descriptor.is_primary_key(column)
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.descriptor.is_foreign_key(column)
    }

    pub fn foreign_keys_for_table(&self, table_name: &str) -> Vec<&ForeignKey> {
        self.descriptor.foreign_keys_for_table(table_name)
    }

    /// Copies referenced key values from `other` into this entity's foreign
    /// key columns that point at `other`'s table.
    pub fn read_fk_from(&mut self, other: &Entity) {
        let pairs: Vec<(String, Option<Value>)> = self
            .descriptor
            .foreign_keys_for_table(other.table_name())
            .into_iter()
            .map(|foreign_key| {
                (
                    foreign_key.column.clone(),
                    other.get(&foreign_key.ref_column).cloned(),
                )
            })
            .collect();
        for (column, value) in pairs {
            self.set(&column, value.unwrap_or(Value::Null));
        }
    }

    /// Copies this entity's foreign key values into the referenced columns of
    /// `other`.
    pub fn write_to_fk(&self, other: &mut Entity) {
        for foreign_key in self.descriptor.foreign_keys_for_table(other.table_name()) {
            let value = self
                .get(&foreign_key.column)
                .cloned()
                .unwrap_or(Value::Null);
            other.set(&foreign_key.ref_column, value);
        }
    }

    /// Set primary-key values in key declaration order.
    pub fn key_values(&self) -> Vec<(&str, &Value)> {
        self.descriptor
            .keys()
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| (key.as_str(), value)))
            .collect()
    }

    pub fn remove_keys(&mut self) {
        for key in self.descriptor.keys() {
            self.values.remove(key);
        }
    }

    pub fn is_new(&self) -> bool {
        !self
            .descriptor
            .keys()
            .iter()
            .any(|key| self.values.contains_key(key))
    }

    /// Object view, available only for owned entities.
    pub fn as_object(&self) -> Option<ObjectRef<'_>> {
        match self.kind() {
            EntityKind::Owned => Some(ObjectRef::new(self)),
            EntityKind::Plain | EntityKind::Association => None,
        }
    }

    /// Serializes `{"data": ..., "metadata": ...}` for diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&EntityJson {
            data: &self.values,
            metadata: &self.metadata,
        })
        .unwrap_or_else(|_| "{}".to_string())
    }

    /// Compact key description used in errors, e.g. `id=abc`.
    pub fn key_summary(&self) -> String {
        self.key_values()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_name(), self.to_json())
    }
}
