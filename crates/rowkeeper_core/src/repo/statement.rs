//! SQL builders driven by entity descriptors.
//!
//! # Responsibility
//! - Build SELECT/INSERT/UPDATE/DELETE statements from an entity's set
//!   columns, with engine-specific placeholders.
//! - Validate caller-supplied ORDER BY clauses against declared columns.
//!
//! # Invariants
//! - Only declared column names are ever spliced into SQL text; every value
//!   travels as a bound parameter.
//! - UPDATE and DELETE always address a row by its full primary key.

use super::error::{RepoError, RepoResult};
use crate::db::Engine;
use crate::model::descriptor::EntityDescriptor;
use crate::model::entity::Entity;
use crate::model::value::Value;
use crate::schema::dialect::placeholder;
use once_cell::sync::Lazy;
use regex::Regex;

static ORDER_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([A-Za-z_][A-Za-z0-9_]*)(?:\s+(asc|desc))?\s*$")
        .expect("order item regex must compile")
});

/// Rendered statement and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Predicate style of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchMode {
    /// Substring matching for `varchar`/`text` columns.
    pub use_like: bool,
    /// Only meaningful together with `use_like`.
    pub case_sensitive: bool,
}

impl SearchMode {
    pub fn exact() -> Self {
        Self::default()
    }

    pub fn like(case_sensitive: bool) -> Self {
        Self {
            use_like: true,
            case_sensitive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub column: String,
    pub descending: bool,
}

struct Binder {
    engine: Engine,
    params: Vec<Value>,
}

impl Binder {
    fn new(engine: Engine) -> Self {
        Self {
            engine,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        placeholder(self.engine, self.params.len())
    }
}

/// Parses `col [ASC|DESC], ...`. An empty clause yields no items.
pub fn parse_order_by(descriptor: &EntityDescriptor, clause: &str) -> RepoResult<Vec<OrderItem>> {
    if clause.trim().is_empty() {
        return Ok(Vec::new());
    }
    clause
        .split(',')
        .map(|item| {
            let captures = ORDER_ITEM
                .captures(item)
                .ok_or_else(|| RepoError::InvalidOrderBy(clause.to_string()))?;
            let column = captures[1].to_string();
            if descriptor.column(&column).is_none() {
                return Err(RepoError::InvalidOrderBy(clause.to_string()));
            }
            let descending = captures
                .get(2)
                .map(|direction| direction.as_str().eq_ignore_ascii_case("desc"))
                .unwrap_or(false);
            Ok(OrderItem { column, descending })
        })
        .collect()
}

/// Rejects set values whose column is not declared.
pub fn ensure_known_columns(entity: &Entity) -> RepoResult<()> {
    let descriptor = entity.descriptor();
    for column in entity.values().keys() {
        if descriptor.column(column).is_none() {
            return Err(RepoError::UnknownColumn {
                type_name: descriptor.type_name().to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// SELECT over declared columns; every set filter column is one ANDed
/// predicate. No order items falls back to the descriptor ordering.
pub fn select(
    engine: Engine,
    table: &str,
    filter: &Entity,
    mode: SearchMode,
    order: &[OrderItem],
) -> RepoResult<Statement> {
    ensure_known_columns(filter)?;
    let descriptor = filter.descriptor();
    let mut binder = Binder::new(engine);

    let mut predicates = Vec::new();
    for (column, value) in filter.values() {
        let like = mode.use_like
            && descriptor
                .column(column)
                .map(|declared| declared.is_like_searchable())
                .unwrap_or(false);
        let predicate = if value.is_null() {
            format!("{column} IS NULL")
        } else if like && mode.case_sensitive && engine == Engine::Sqlite {
            // SQLite LIKE ignores ASCII case.
            let slot = binder.bind(Value::Text(value.to_text_lossy()));
            format!("instr({column}, {slot}) > 0")
        } else if like && mode.case_sensitive {
            let slot = binder.bind(Value::Text(format!("%{}%", value.to_text_lossy())));
            format!("{column} LIKE {slot}")
        } else if like {
            let slot = binder.bind(Value::Text(format!("%{}%", value.to_text_lossy())));
            format!("LOWER({column}) LIKE LOWER({slot})")
        } else {
            let slot = binder.bind(value.clone());
            format!("{column} = {slot}")
        };
        predicates.push(predicate);
    }

    let column_list = descriptor
        .columns()
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {column_list} FROM {table}");
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    let order_terms: Vec<String> = if order.is_empty() {
        descriptor.order_by().to_vec()
    } else {
        order
            .iter()
            .map(|item| {
                if item.descending {
                    format!("{} DESC", item.column)
                } else {
                    item.column.clone()
                }
            })
            .collect()
    };
    if !order_terms.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms.join(", "));
    }

    Ok(Statement {
        sql,
        params: binder.params,
    })
}

/// INSERT of every set column.
pub fn insert(engine: Engine, table: &str, entity: &Entity) -> RepoResult<Statement> {
    ensure_known_columns(entity)?;
    if entity.values().is_empty() {
        return Err(RepoError::Validation(format!(
            "{}: nothing to insert",
            entity.type_name()
        )));
    }
    let mut binder = Binder::new(engine);
    let mut columns = Vec::with_capacity(entity.values().len());
    let mut slots = Vec::with_capacity(entity.values().len());
    for (column, value) in entity.values() {
        columns.push(column.as_str());
        slots.push(binder.bind(value.clone()));
    }
    Ok(Statement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            slots.join(", ")
        ),
        params: binder.params,
    })
}

/// UPDATE of every set non-key column. `None` when only keys are set.
pub fn update(engine: Engine, table: &str, entity: &Entity) -> RepoResult<Option<Statement>> {
    let columns: Vec<&str> = entity
        .values()
        .keys()
        .map(String::as_str)
        .filter(|column| !entity.is_primary_key(column))
        .collect();
    update_columns(engine, table, entity, &columns)
}

/// UPDATE of the listed columns only; unset listed columns are skipped.
pub fn update_columns(
    engine: Engine,
    table: &str,
    entity: &Entity,
    columns: &[&str],
) -> RepoResult<Option<Statement>> {
    ensure_known_columns(entity)?;
    let mut binder = Binder::new(engine);
    let mut assignments = Vec::new();
    for column in columns {
        if let Some(value) = entity.get(column) {
            let slot = binder.bind(value.clone());
            assignments.push(format!("{column} = {slot}"));
        }
    }
    if assignments.is_empty() {
        return Ok(None);
    }
    let predicate = key_predicate(&mut binder, entity)?;
    Ok(Some(Statement {
        sql: format!(
            "UPDATE {table} SET {} WHERE {predicate}",
            assignments.join(", ")
        ),
        params: binder.params,
    }))
}

pub fn delete(engine: Engine, table: &str, entity: &Entity) -> RepoResult<Statement> {
    let mut binder = Binder::new(engine);
    let predicate = key_predicate(&mut binder, entity)?;
    Ok(Statement {
        sql: format!("DELETE FROM {table} WHERE {predicate}"),
        params: binder.params,
    })
}

/// Fails unless every primary-key column holds a non-NULL value.
pub fn ensure_primary_key(entity: &Entity) -> RepoResult<()> {
    key_predicate(&mut Binder::new(Engine::Sqlite), entity).map(|_| ())
}

fn key_predicate(binder: &mut Binder, entity: &Entity) -> RepoResult<String> {
    let keys = entity.descriptor().keys();
    if keys.is_empty() {
        return Err(RepoError::MissingPrimaryKey(entity.type_name().to_string()));
    }
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        match entity.get(key) {
            Some(value) if !value.is_null() => {
                let slot = binder.bind(value.clone());
                parts.push(format!("{key} = {slot}"));
            }
            _ => return Err(RepoError::MissingPrimaryKey(entity.type_name().to_string())),
        }
    }
    Ok(parts.join(" AND "))
}
