//! Column and foreign-key declarations.

use serde::Serialize;

/// Coarse classification of a declared SQL type.
///
/// Drives row decoding and LIKE eligibility; the declared string itself is
/// what lands in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Text,
    Integer,
    Float,
    Bool,
    DateTime,
    Other,
}

/// Classifies a declared SQL type such as `varchar(16)` or `int(11)`.
pub fn type_family(sql_type: &str) -> TypeFamily {
    let normalized = sql_type.trim().to_ascii_lowercase();
    if normalized.starts_with("tinyint(1)") || normalized.starts_with("bool") {
        TypeFamily::Bool
    } else if normalized.contains("char") || normalized.contains("text") || normalized == "clob" {
        TypeFamily::Text
    } else if normalized.contains("int") {
        TypeFamily::Integer
    } else if ["float", "double", "real", "decimal", "numeric"]
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
    {
        TypeFamily::Float
    } else if normalized.starts_with("datetime")
        || normalized.starts_with("timestamp")
        || normalized == "date"
    {
        TypeFamily::DateTime
    } else {
        TypeFamily::Other
    }
}

/// One declared table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
    /// Raw constraint clauses appended after the type, e.g. `NOT NULL`.
    pub constraints: Vec<String>,
}

impl Column {
    pub fn new(name: &str, sql_type: &str, constraints: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            constraints: constraints.iter().map(|item| item.to_string()).collect(),
        }
    }

    pub fn family(&self) -> TypeFamily {
        type_family(&self.sql_type)
    }

    /// Only `varchar` and `text` columns take part in substring matching.
    pub fn is_like_searchable(&self) -> bool {
        let normalized = self.sql_type.to_ascii_lowercase();
        normalized.contains("varchar") || normalized.ends_with("text")
    }

    pub fn is_unique(&self) -> bool {
        self.constraints
            .iter()
            .any(|clause| clause.to_ascii_uppercase().contains("UNIQUE"))
    }
}

/// Logical reference from one column to a column of another table.
///
/// Several foreign keys may share one source column; the reference is then
/// polymorphic and resolved by hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl ForeignKey {
    pub fn new(column: &str, ref_table: &str, ref_column: &str) -> Self {
        Self {
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        }
    }
}
