/// Result type for applier operations.
pub type ApplierResult<T> = Result<T, ApplierError>;

/// Errors the Event Applier Service can surface.
#[derive(Debug, thiserror::Error)]
pub enum ApplierError {
    #[error("storage error: {0}")]
    Storage(#[from] datacollect_storage::StorageError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("entity not found: {0}")]
    EntityNotFound(datacollect_types::EntityGuid),

    #[error("invalid group: {0} is not a Group")]
    InvalidGroup(datacollect_types::EntityGuid),

    #[error("no applier registered for event type {0:?}")]
    UnknownEventType(datacollect_types::EventType),
}
