use thiserror::Error;

/// Errors raised by the kickstart data layer.
///
/// Lookups that find nothing are not errors; they return `None` or an empty
/// collection. Everything the store itself rejects surfaces as
/// [`KickstartError::DataAccess`].
#[derive(Debug, Error)]
pub enum KickstartError {
    #[error("data access failed during {op}: {source}")]
    DataAccess {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} must be saved before it can be referenced")]
    Transient(&'static str),

    #[error("provisioning sync failed: {0}")]
    Sync(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KickstartError {
    /// Wrap a store failure, logging it at the boundary where it was caught.
    ///
    /// This is the only place store failures are logged.
    pub fn data_access(op: &'static str, source: rusqlite::Error) -> Self {
        if is_constraint_violation(&source) {
            tracing::warn!(op, error = %source, "kickstart write rejected by constraint");
        } else {
            tracing::error!(op, error = %source, "kickstart data access failed");
        }
        Self::DataAccess { op, source }
    }

    /// Whether the store refused a write because of a unique, foreign key or
    /// check constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::DataAccess { source, .. } if is_constraint_violation(source))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}

pub type Result<T> = std::result::Result<T, KickstartError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn recognizes_unique_violations() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (label TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();

        let duplicate = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .map_err(|e| KickstartError::data_access("insert", e))
            .unwrap_err();
        let missing_table = conn
            .execute("INSERT INTO nope VALUES ('a')", [])
            .map_err(|e| KickstartError::data_access("insert", e))
            .unwrap_err();

        assert!(duplicate.is_constraint_violation());
        assert!(!missing_table.is_constraint_violation());
        assert!(!KickstartError::not_found("tree").is_constraint_violation());
    }
}
