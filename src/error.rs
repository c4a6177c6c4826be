use thiserror::Error;
use validator::ValidationErrors;

/// Failures that abort `PollingScheduler::start`.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Change log is disabled on table `{0}`")]
    LogDisabled(String),
    #[error("Change log of table `{0}` is enabled but has no identifier yet")]
    LogIdMissing(String),
    #[error("Table `{0}` has no shards")]
    NoShards(String),
    #[error("Poll interval must be greater than zero")]
    ZeroInterval,
    #[error(transparent)]
    Client(#[from] anyhow::Error),
}

/// The shard is still readable but the cursor's position is not: the iterator expired or
/// points at records the log has already trimmed.
#[derive(Debug, Error)]
#[error("shard iterator can no longer be used: {0}")]
pub struct IteratorExpired(pub String);

/// A change record whose image cannot be turned into a typed entity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record has no keys")]
    MissingKeys,
    #[error("record has no sequence number")]
    MissingSequenceNumber,
    #[error("`{entity}` image is missing `{field}`")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
    #[error("`{entity}` image has an invalid `{field}`")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
    },
}

/// Why one partitioned-log record is reported back for redelivery.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("payload is not a valid event: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("event violates the `{event_type}` schema: {errors}")]
    Validation {
        event_type: String,
        errors: ValidationErrors,
    },
    #[error("unknown event type `{0}`")]
    UnknownType(String),
    #[error("projection failed: {0}")]
    Projection(#[source] anyhow::Error),
}
