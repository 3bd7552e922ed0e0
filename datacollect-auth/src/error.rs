/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors the Auth Manager and its adapters can surface.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("storage error: {0}")]
    Storage(#[from] datacollect_storage::StorageError),

    #[error("no auth provider registered for type {0:?}")]
    UnknownAuthProvider(String),

    #[error("no auth provider is configured")]
    NoProviderConfigured,

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("the stored token is invalid or expired")]
    InvalidToken,

    #[error("callback rejected: {0}")]
    CallbackRejected(String),
}
