//! The Auth Manager: dispatches authentication to a pluggable
//! [`adapter::AuthAdapter`] and owns the shared token store.

pub mod adapter;
pub mod error;
pub mod manager;

pub use adapter::{AuthAdapter, AuthProviderType, AuthSession, NullAuthAdapter};
pub use error::{AuthError, AuthResult};
pub use manager::{AuthAdapterRegistry, AuthConfig, AuthManager};
