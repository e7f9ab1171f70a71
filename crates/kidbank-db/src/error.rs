//! # Database Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  GatewayError ← What the client sees from any backend                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ClientError → toast message                                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kidbank_core::gateway::{Collection, GatewayError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Row not found.
    ///
    /// ## When This Occurs
    /// - An update or increment names a kid that does not exist
    /// - A request being resolved was deleted
    #[error("{collection} not found: {id}")]
    NotFound { collection: Collection, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a document whose id already exists
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// The row exists but is in the wrong state for the write.
    ///
    /// ## When This Occurs
    /// - Resolving a request that is no longer pending
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored column could not be decoded (bad custom theme JSON).
    #[error("Corrupt {column} column: {message}")]
    Corrupt { column: String, message: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        DbError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn corrupt(column: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DbError::Corrupt {
            column: column.into(),
            message: err.to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// What the client sees.
///
/// ## Error Mapping
/// ```text
/// NotFound                         → GatewayError::NotFound
/// UniqueViolation, Conflict        → GatewayError::Conflict
/// ConnectionFailed, PoolExhausted  → GatewayError::Unavailable
/// everything else                  → GatewayError::Backend
/// ```
impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { collection, id } => GatewayError::NotFound { collection, id },
            DbError::UniqueViolation { field, .. } => GatewayError::Conflict(field),
            DbError::Conflict(message) => GatewayError::Conflict(message),
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                GatewayError::Unavailable(err.to_string())
            }
            other => GatewayError::Backend(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_mapping() {
        assert_eq!(
            GatewayError::from(DbError::not_found(Collection::Kids, "k1")),
            GatewayError::not_found(Collection::Kids, "k1")
        );
        assert!(matches!(
            GatewayError::from(DbError::Conflict("request r1 is already approved".into())),
            GatewayError::Conflict(_)
        ));
        assert!(matches!(
            GatewayError::from(DbError::PoolExhausted),
            GatewayError::Unavailable(_)
        ));
        assert!(matches!(
            GatewayError::from(DbError::corrupt("custom_themes", "expected value")),
            GatewayError::Backend(_)
        ));
    }
}
