//! Storage errors shared by every repository adapter.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | RepositoryError |
//! |------------|-----------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | any | `Storage` |

use stockline_core::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored record failed domain validation while being changed
    /// (e.g. a movement that would drive stock negative).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Map a sqlx error to a `RepositoryError`, keeping the operation name in the message.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("{operation}: row not found")),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => RepositoryError::Conflict(format!("{operation}: duplicate key ({db_err})")),
            Some("23503") => {
                RepositoryError::Conflict(format!("{operation}: referenced row missing ({db_err})"))
            }
            Some("23514") => RepositoryError::Conflict(format!("{operation}: check violated ({db_err})")),
            _ => RepositoryError::Storage(format!("{operation}: {db_err}")),
        },
        other => RepositoryError::Storage(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = map_sqlx_error("get_item", sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::NotFound(msg) if msg.contains("get_item")));
    }

    #[test]
    fn pool_closed_maps_to_storage() {
        let err = map_sqlx_error("list_items", sqlx::Error::PoolClosed);
        assert!(matches!(err, RepositoryError::Storage(_)));
    }
}
