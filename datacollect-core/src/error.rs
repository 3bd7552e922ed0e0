/// Result type for whole-engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Top-level error type the facade surfaces, composing every crate's
/// own error enum via `#[from]` the same way each of those enums
/// composes `StorageError`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] datacollect_storage::StorageError),

    #[error("applier error: {0}")]
    Applier(#[from] datacollect_applier::ApplierError),

    #[error("sync error: {0}")]
    Sync(#[from] datacollect_sync::SyncError),

    #[error("auth error: {0}")]
    Auth(#[from] datacollect_auth::AuthError),
}
