use thiserror::Error;

use crate::JobId;

/// Result type for caller-facing queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for ordered store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for transport sends
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced to callers of the queue service
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// Neither the durable path nor the direct-send fallback accepted the message
    #[error("Queue unavailable: store failed ({store}) and direct send failed ({transport})")]
    QueueUnavailable {
        store: StoreError,
        transport: TransportError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Poller is already running")]
    PollerAlreadyRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the ordered store. All of them fail fast.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Job already present in store: {0}")]
    DuplicateJob(JobId),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Check if the store could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Delivery attempt failure. Every variant is routed through the retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Send timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Transport panicked: {0}")]
    Panicked(String),
}

impl TransportError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_unavailable_names_both_causes() {
        let err = QueueError::QueueUnavailable {
            store: StoreError::unavailable("connection refused"),
            transport: TransportError::connection("smtp down"),
        };
        let msg = err.to_string();
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("smtp down"));
    }

    #[test]
    fn store_error_converts_into_queue_error() {
        let err: QueueError = StoreError::DuplicateJob(JobId::from("abc")).into();
        assert!(matches!(err, QueueError::Store(StoreError::DuplicateJob(_))));
        assert!(!StoreError::DuplicateJob(JobId::from("abc")).is_unavailable());
    }
}
