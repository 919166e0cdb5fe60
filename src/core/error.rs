//! Error taxonomy shared by the store, the scheduler and the transport.

use std::time::Duration;

/// Failures surfaced by [`crate::database::Store`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bad argument supplied by the caller. Nothing was written.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The addressed record does not exist (or was deleted concurrently).
    #[error("{entity} {key} does not exist")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} {key} already exists")]
    AlreadyExists { entity: &'static str, key: String },

    /// Backend I/O failure. The operation was aborted as a whole.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The operation did not finish within its bound.
    #[error("{operation} did not complete within {after:?}")]
    Cancelled {
        operation: &'static str,
        after: Duration,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Worth retrying later: the backend may simply have been slow.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Cancelled { .. })
    }
}

/// Failure to hand a message to the chat transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport rejected message: {0}")]
    Rejected(String),
}

/// Invalid process configuration, reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("deadline", 7);
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "deadline 7 does not exist");
    }

    #[test]
    fn test_cancelled_is_transient() {
        let err = StoreError::Cancelled {
            operation: "list_due_deadlines",
            after: Duration::from_secs(5),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("list_due_deadlines"));
    }
}
