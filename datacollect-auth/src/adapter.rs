//! `AuthAdapter`: the pluggable contract an authentication provider
//! implements, in the same async_trait idiom as `SyncTransport` and
//! `ExternalSyncAdapter`. No concrete provider (Auth0, Keycloak, basic
//! username/password) ships with this crate — only [`NullAuthAdapter`],
//! used in tests and as the "no auth configured" default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;

/// Identifies a configured provider (e.g. `"auth0"`, `"keycloak"`,
/// `"null"`). A plain string rather than a closed enum, matching how
/// `EventType::Custom` leaves room for deployments to name their own
/// kinds without a core edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthProviderType(pub String);

impl AuthProviderType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AuthProviderType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What a successful `login`/`handle_callback` hands back: the token to
/// store, and the username to record alongside it if the provider
/// reports one.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub username: Option<String>,
}

impl AuthSession {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), username: None }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// One authentication provider's login/logout/validate/callback flow.
#[async_trait]
pub trait AuthAdapter: Send + Sync {
    async fn login(&self, credentials: &serde_json::Value) -> AuthResult<AuthSession>;
    async fn logout(&self, token: &str) -> AuthResult<()>;
    async fn validate_token(&self, token: &str) -> AuthResult<bool>;
    /// Completes a redirect-based flow (OAuth-style); adapters with no
    /// such flow can return `CallbackRejected`.
    async fn handle_callback(&self, payload: &serde_json::Value) -> AuthResult<AuthSession>;
}

/// The "no auth configured" default: every login succeeds with a fixed
/// token, every token validates, logout and callback are no-ops. Used
/// as the sole provider when a deployment hasn't wired up a real one,
/// and directly in the Auth Manager's own tests.
#[derive(Debug, Default)]
pub struct NullAuthAdapter;

const NULL_TOKEN: &str = "null-token";

#[async_trait]
impl AuthAdapter for NullAuthAdapter {
    async fn login(&self, credentials: &serde_json::Value) -> AuthResult<AuthSession> {
        let username = credentials.get("username").and_then(|v| v.as_str()).map(str::to_string);
        Ok(match username {
            Some(u) => AuthSession::new(NULL_TOKEN).with_username(u),
            None => AuthSession::new(NULL_TOKEN),
        })
    }

    async fn logout(&self, _token: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn validate_token(&self, token: &str) -> AuthResult<bool> {
        Ok(token == NULL_TOKEN)
    }

    async fn handle_callback(&self, _payload: &serde_json::Value) -> AuthResult<AuthSession> {
        Ok(AuthSession::new(NULL_TOKEN))
    }
}
