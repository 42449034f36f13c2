//! Error types for itrack

use thiserror::Error;

/// itrack error types
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Record lookup failed
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Input rejected before touching the database
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation conflicts with the current state of a record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Workflow designer graph is malformed
    #[error("Invalid workflow graph: {0}")]
    InvalidGraph(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON encoding of stored documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// YAML catalog size exceeded limit
    #[error("System catalog exceeds 1MB limit (size: {0} bytes)")]
    CatalogSizeExceeded(usize),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A panic while holding the connection lock
    #[error("Database connection lock poisoned")]
    LockPoisoned,

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

impl TrackerError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// True when SQLite rejected a write because of a UNIQUE, CHECK or
    /// FOREIGN KEY constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            TrackerError::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Result type alias using TrackerError
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = TrackerError::not_found("system", 42);
        assert_eq!(err.to_string(), "system 42 not found");
    }

    #[test]
    fn test_constraint_violation_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT NOT NULL UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: TrackerError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_constraint_violation());
        assert!(!TrackerError::Validation("x".into()).is_constraint_violation());
    }
}
