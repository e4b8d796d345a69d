//! Storage engines, connection pooling and transactions.
//!
//! # Responsibility
//! - Name the supported SQL engines.
//! - Open and configure pooled SQLite connections.
//! - Provide the transaction handle shared by a write and its nested hooks.
//!
//! # Invariants
//! - Pooled connections have `foreign_keys=ON` and a busy timeout.
//! - Table names are always `<prefix>_<table>` when a prefix is configured.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

mod open;
mod session;

pub use open::{open_pool, open_pool_in_memory, DbPool, PooledConn};
pub use session::{Session, TransactionScope};

pub type DbResult<T> = Result<T, DbError>;

/// SQL engine family a schema or pool targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Mysql,
    #[serde(alias = "sqlite3")]
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for Engine {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(DbError::UnknownEngine(other.to_string())),
        }
    }
}

impl Display for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    /// Engine is understood at the dialect level but has no linked driver.
    UnsupportedEngine(Engine),
    UnknownEngine(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool error: {err}"),
            Self::UnsupportedEngine(engine) => {
                write!(f, "no connection driver is linked for engine `{engine}`")
            }
            Self::UnknownEngine(value) => write!(
                f,
                "unknown database engine `{value}`; expected mysql|sqlite|postgres"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::UnsupportedEngine(_) => None,
            Self::UnknownEngine(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

impl DbError {
    /// True for UNIQUE / PRIMARY KEY violations reported by the driver.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }
}

/// Applies the table prefix convention: `<prefix>_<table>`.
pub fn prefixed_table_name(prefix: &str, table_name: &str) -> String {
    if prefix.is_empty() {
        table_name.to_string()
    } else {
        format!("{prefix}_{table_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::{prefixed_table_name, Engine};

    #[test]
    fn engine_identifiers_parse_with_aliases() {
        assert_eq!("sqlite3".parse::<Engine>().unwrap(), Engine::Sqlite);
        assert_eq!("Postgres".parse::<Engine>().unwrap(), Engine::Postgres);
        assert_eq!("mysql".parse::<Engine>().unwrap(), Engine::Mysql);
        assert!("oracle".parse::<Engine>().is_err());
    }

    #[test]
    fn table_names_are_prefixed_with_schema() {
        assert_eq!(prefixed_table_name("rprj", "users"), "rprj_users");
        assert_eq!(prefixed_table_name("", "users"), "users");
    }
}
