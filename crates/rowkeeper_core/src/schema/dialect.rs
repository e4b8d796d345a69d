//! Engine-specific SQL fragments.
//!
//! # Responsibility
//! - Render bind placeholders per engine.
//! - Translate declared column types into each engine's DDL vocabulary.
//! - Provide catalog queries and normalize live column types for drift
//!   comparison.

use crate::db::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

static PG_INT_WIDTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(tiny|small|medium|big)?int(eger)?\s*\(\s*\d+\s*\)$")
        .expect("postgres int width regex must compile")
});

/// Bind placeholder for the 1-based parameter `index`.
pub fn placeholder(engine: Engine, index: usize) -> String {
    match engine {
        Engine::Sqlite => format!("?{index}"),
        Engine::Mysql => "?".to_string(),
        Engine::Postgres => format!("${index}"),
    }
}

/// Declared type as it should appear in `CREATE TABLE` for `engine`.
pub fn translate_type(engine: Engine, sql_type: &str) -> String {
    match engine {
        Engine::Mysql | Engine::Sqlite => sql_type.to_string(),
        Engine::Postgres => {
            let trimmed = sql_type.trim();
            let lower = trimmed.to_ascii_lowercase();
            if lower == "datetime" {
                "TIMESTAMP".to_string()
            } else if lower.starts_with("tinyint") {
                "SMALLINT".to_string()
            } else if PG_INT_WIDTH.is_match(trimmed) {
                if lower.starts_with("big") {
                    "BIGINT".to_string()
                } else {
                    "INTEGER".to_string()
                }
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// Query returning one row when `table` exists. Binds the table name once.
pub fn table_exists_sql(engine: Engine) -> &'static str {
    match engine {
        Engine::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
        Engine::Mysql => {
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
        }
        Engine::Postgres => "SELECT to_regclass($1)::text",
    }
}

/// Query listing `(column_name, type)` of a live table.
///
/// SQLite cannot bind a table name into `PRAGMA`, so the name is inlined; it
/// is always a validated identifier.
pub fn live_columns_sql(engine: Engine, table: &str) -> String {
    match engine {
        Engine::Sqlite => format!("SELECT name, type FROM pragma_table_info('{table}')"),
        Engine::Mysql => format!("DESCRIBE {table}"),
        Engine::Postgres => "SELECT column_name, data_type, character_maximum_length \
             FROM information_schema.columns WHERE table_name = $1"
            .to_string(),
    }
}

/// Normalizes a live column type reported by the catalog so it can be
/// compared with a declared type.
///
/// `max_length` is the Postgres `character_maximum_length`, when reported.
pub fn normalize_live_type(engine: Engine, live_type: &str, max_length: Option<i64>) -> String {
    let mut normalized = live_type.trim().to_ascii_lowercase();
    if engine == Engine::Postgres {
        for (from, to) in [
            ("character varying", "varchar"),
            ("character", "char"),
            ("timestamp without time zone", "datetime"),
            ("timestamp", "datetime"),
            ("time without time zone", "time"),
            ("integer", "int"),
        ] {
            normalized = normalized.replace(from, to);
        }
        if let Some(length) = max_length.filter(|length| *length > 0) {
            normalized.push_str(&format!("({length})"));
        }
    }
    normalized
}

/// Normalizes a declared type for comparison with a normalized live type.
pub fn normalize_declared_type(engine: Engine, declared: &str) -> String {
    let lower = declared.trim().to_ascii_lowercase();
    match engine {
        Engine::Postgres => {
            if PG_INT_WIDTH.is_match(&lower) && !lower.starts_with("tiny") {
                if lower.starts_with("big") {
                    "bigint".to_string()
                } else {
                    "int".to_string()
                }
            } else if lower.starts_with("tinyint") {
                "smallint".to_string()
            } else {
                lower
            }
        }
        Engine::Mysql | Engine::Sqlite => lower,
    }
}

/// Statement that would change a live column to its declared type.
///
/// `None` when the engine cannot alter a column type in place.
pub fn alter_column_type_sql(
    engine: Engine,
    table: &str,
    column: &str,
    sql_type: &str,
) -> Option<String> {
    match engine {
        Engine::Mysql => Some(format!(
            "ALTER TABLE {table} MODIFY COLUMN {column} {sql_type}"
        )),
        Engine::Postgres => Some(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {}",
            translate_type(engine, sql_type)
        )),
        Engine::Sqlite => None,
    }
}

pub fn add_column_sql(engine: Engine, table: &str, column: &str, sql_type: &str) -> String {
    format!(
        "ALTER TABLE {table} ADD COLUMN {column} {}",
        translate_type(engine, sql_type)
    )
}
