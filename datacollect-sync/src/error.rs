/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors the Internal and External Sync Coordinators can surface.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] datacollect_storage::StorageError),

    #[error("applier error: {0}")]
    Applier(#[from] datacollect_applier::ApplierError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("a sync is already running for this tenant")]
    AlreadySyncing,

    #[error("sync was cancelled")]
    Cancelled,

    #[error("sync is blocked by unresolved potential duplicates")]
    DuplicatesBlockSync,

    #[error("authentication is required")]
    AuthRequired,

    #[error("the stored token is invalid or expired")]
    InvalidToken,

    #[error("operation timed out")]
    Timeout,

    #[error("no external sync adapter registered for type {0:?}")]
    UnknownAdapterType(String),
}
