use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurgeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("request rejected (status {status}): {message}")]
    RequestRejected { status: u16, message: String },
    #[error("failed to delete record {record_id}: {reason}")]
    RecordDeleteFailed { record_id: String, reason: String },
    #[error("invocation deadline exceeded")]
    DeadlineExceeded,
}
