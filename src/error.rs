use thiserror::Error;

/// Failures surfaced by the mastery engine and its stores.
#[derive(Debug, Error)]
pub enum MasteryError {
    /// A referenced student, standard, grade, or problem does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Input violated a documented range or format.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A uniqueness constraint fired on a concurrent write.
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// The database could not be reached (pool exhausted, connection or TLS failure).
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MasteryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns `true` for errors caused by the caller's input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Validation(_))
    }
}

impl From<sqlx::Error> for MasteryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::StoreUnavailable(err),
            other => Self::Database(other),
        }
    }
}

/// Postgres SQLSTATE for `unique_violation`.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for `foreign_key_violation`.
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn sql_state(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_store_unavailable() {
        let err: MasteryError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, MasteryError::StoreUnavailable(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn row_not_found_is_a_database_error() {
        let err: MasteryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, MasteryError::Database(_)));
    }

    #[test]
    fn lookups_and_validation_are_client_errors() {
        assert!(MasteryError::not_found("standard 42").is_client_error());
        assert!(MasteryError::validation("score out of range").is_client_error());
        assert_eq!(
            MasteryError::not_found("standard 42").to_string(),
            "standard 42 not found"
        );
    }
}
