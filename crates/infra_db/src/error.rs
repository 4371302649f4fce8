//! Database error types
//!
//! SQLx errors are classified by PostgreSQL error code and then folded into
//! `PortError` at the adapter boundary, so the domain never sees a driver
//! type.

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be mapped back to a domain value
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DatabaseError::DuplicateEntry(_))
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted)
    }
}

/// Maps SQLx errors to specific variants using the PostgreSQL error code
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::InvalidRow(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                    Some("23503") | Some("23514") => {
                        DatabaseError::ConstraintViolation(db_err.message().to_string())
                    }
                    _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::from(&error)
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(message) => PortError::NotFound {
                entity_type: "Record".to_string(),
                id: message,
            },
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::ConstraintViolation(message) => PortError::validation(message),
            DatabaseError::InvalidRow(message) => PortError::transformation(message),
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted => PortError::Connection {
                message: error.to_string(),
                source: Some(Box::new(error)),
            },
            DatabaseError::QueryFailed(_) | DatabaseError::MigrationFailed(_) => PortError::Internal {
                message: error.to_string(),
                source: Some(Box::new(error)),
            },
        }
    }
}
