use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    #[error("database configuration error: {0}")]
    ConfigurationError(String),

    #[error("query failed: {0}")]
    QueryError(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    MappingError(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition")]
    InvalidState,

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<DbError> for control_core::CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => control_core::CoreError::NotFound(what),
            DbError::UniqueViolation(what) => control_core::CoreError::Conflict(what),
            DbError::InvalidState => {
                control_core::CoreError::Conflict("invalid state transition".into())
            }
            DbError::InvalidReference(what) => control_core::CoreError::Validation(what),
            DbError::Forbidden(what) => control_core::CoreError::Forbidden(what),
            other => control_core::CoreError::Internal(other.to_string()),
        }
    }
}

/// libSQL surfaces unique-constraint violations as a generic query error;
/// detect them by message since the driver does not expose a typed variant.
pub fn is_unique_violation(err: &libsql::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("unique constraint") || message.contains("unique_violation")
}
