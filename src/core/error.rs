use std::time::Duration;
use thiserror::Error;

/// Errors raised by a document store backend or by the connection wrapping it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unsupported store scheme '{0}' (expected memory:// or file://)")]
    UnsupportedScheme(String),

    #[error("Store operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Connection is closed")]
    Closed,

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Duplicate _id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced by the administrative workflows.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot connect to store: {0}")]
    Connection(#[source] StoreError),

    #[error("No owner with role '{role}' found")]
    NotFound { role: String },

    #[error("{count} owners with role '{role}' found ({}); refusing to pick one", .ids.join(", "))]
    Ambiguous {
        role: String,
        count: usize,
        ids: Vec<String>,
    },

    #[error("Owner record is malformed: {0}")]
    InvalidOwner(String),

    #[error("Operation on '{collection}' failed: {source}")]
    Operation {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("{failed} of {total} collection updates failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("Owner creation failed after deleting {deleted} record(s): {source}")]
    Creation {
        deleted: u64,
        #[source]
        source: StoreError,
    },

    #[error("Invalid owner spec: {0}")]
    InvalidSpec(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid migration plan: {0}")]
    InvalidPlan(String),

    #[error("Workflow state error: {0}")]
    State(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AdminError>;

impl AdminError {
    /// Wraps a store failure with the collection it happened on.
    pub fn operation(collection: impl Into<String>, source: StoreError) -> Self {
        Self::Operation {
            collection: collection.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_lists_ids() {
        let err = AdminError::Ambiguous {
            role: "super_admin".into(),
            count: 2,
            ids: vec!["a1".into(), "b2".into()],
        };
        let message = err.to_string();
        assert!(message.contains("2 owners"));
        assert!(message.contains("a1, b2"));
    }

    #[test]
    fn test_operation_keeps_source() {
        let err = AdminError::operation("jobs", StoreError::Closed);
        assert_eq!(err.to_string(), "Operation on 'jobs' failed: Connection is closed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(ref m) if m.contains("gone")));
    }
}
