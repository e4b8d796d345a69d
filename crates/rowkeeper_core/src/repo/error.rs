use crate::db::DbError;
use crate::model::value::ValueError;
use crate::registry::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity search and lifecycle operations.
#[derive(Debug)]
pub enum RepoError {
    /// Hook-level validation failure.
    Validation(String),
    /// Unique value already taken, detected by a hook or by the engine.
    AlreadyExists(String),
    NotFound(String),
    MissingPrimaryKey(String),
    UnknownColumn { type_name: String, column: String },
    InvalidOrderBy(String),
    InvalidData(String),
    Registry(RegistryError),
    Value(ValueError),
    Db(DbError),
}

impl RepoError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Maps a DML failure, turning unique violations into `AlreadyExists`.
    pub(crate) fn from_write(table: &str, err: DbError) -> Self {
        if err.is_unique_violation() {
            Self::AlreadyExists(format!("{table}: row already exists ({err})"))
        } else {
            Self::Db(err)
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::AlreadyExists(message) => write!(f, "{message}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::MissingPrimaryKey(type_name) => {
                write!(f, "{type_name}: primary key values are required")
            }
            Self::UnknownColumn { type_name, column } => {
                write!(f, "{type_name}: unknown column `{column}`")
            }
            Self::InvalidOrderBy(clause) => write!(f, "invalid ORDER BY clause `{clause}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Value(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Value(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(value: r2d2::Error) -> Self {
        Self::Db(DbError::Pool(value))
    }
}

impl From<RegistryError> for RepoError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ValueError> for RepoError {
    fn from(value: ValueError) -> Self {
        Self::Value(value)
    }
}
