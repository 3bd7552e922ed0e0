//! The Auth Manager: dispatches `login`/`logout`/`isAuthenticated`/
//! `validateToken`/`handleCallback` to whichever configured
//! [`AuthAdapter`] matches, and owns the shared `AuthStorageAdapter`
//! also read by the Internal Sync Coordinator for its bearer token.

use std::collections::HashMap;
use std::sync::Arc;

use datacollect_storage::AuthStorageAdapter;
use tracing::{debug, info, warn};

use crate::adapter::{AuthAdapter, AuthProviderType, NullAuthAdapter};
use crate::error::{AuthError, AuthResult};

/// One entry of deployment configuration: which provider type to
/// instantiate and its free-form settings (credentials, issuer URL,
/// client id — entirely adapter-defined).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub provider_type: AuthProviderType,
    pub fields: serde_json::Value,
}

type AuthAdapterFactory = Box<dyn Fn(&AuthConfig) -> Box<dyn AuthAdapter> + Send + Sync>;

/// The `{type → factory}` mapping used to instantiate adapters from
/// `AuthConfig` entries, in the same shape as
/// `datacollect_sync::ExternalAdapterRegistry`. Only `"null"` is
/// registered by default — concrete providers are out of scope.
#[derive(Default)]
pub struct AuthAdapterRegistry {
    factories: HashMap<String, AuthAdapterFactory>,
}

impl AuthAdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        registry.register("null", Box::new(|_config| Box::new(NullAuthAdapter) as Box<dyn AuthAdapter>));
        registry
    }

    pub fn register(&mut self, provider_type: impl Into<String>, factory: AuthAdapterFactory) {
        self.factories.insert(provider_type.into(), factory);
    }

    pub fn build(&self, config: &AuthConfig) -> AuthResult<Box<dyn AuthAdapter>> {
        let factory = self.factories.get(config.provider_type.as_str()).ok_or_else(|| AuthError::UnknownAuthProvider(config.provider_type.0.clone()))?;
        Ok(factory(config))
    }
}

pub struct AuthManager {
    storage: Arc<dyn AuthStorageAdapter>,
    providers: Vec<(AuthProviderType, Box<dyn AuthAdapter>)>,
}

impl AuthManager {
    #[must_use]
    pub fn new(storage: Arc<dyn AuthStorageAdapter>) -> Self {
        Self { storage, providers: Vec::new() }
    }

    /// Builds a manager from deployment config, instantiating each
    /// entry's adapter via `registry`.
    pub fn from_configs(storage: Arc<dyn AuthStorageAdapter>, configs: &[AuthConfig], registry: &AuthAdapterRegistry) -> AuthResult<Self> {
        let mut manager = Self::new(storage);
        for config in configs {
            let adapter = registry.build(config)?;
            manager.register_provider(config.provider_type.clone(), adapter);
        }
        Ok(manager)
    }

    pub fn register_provider(&mut self, provider_type: AuthProviderType, adapter: Box<dyn AuthAdapter>) {
        self.providers.push((provider_type, adapter));
    }

    fn find(&self, provider_type: &AuthProviderType) -> AuthResult<&dyn AuthAdapter> {
        self.providers
            .iter()
            .find(|(t, _)| t == provider_type)
            .map(|(_, a)| a.as_ref())
            .ok_or_else(|| AuthError::UnknownAuthProvider(provider_type.0.clone()))
    }

    /// Logs in against `provider_type`, or the sole configured provider
    /// when `None` and exactly one is registered. Stores the resulting
    /// token (and username, if reported) in auth storage.
    pub async fn login(&self, credentials: &serde_json::Value, provider_type: Option<&AuthProviderType>) -> AuthResult<()> {
        let provider_type = match provider_type {
            Some(t) => t.clone(),
            None => self.providers.first().map(|(t, _)| t.clone()).ok_or(AuthError::NoProviderConfigured)?,
        };
        let adapter = self.find(&provider_type)?;
        let session = adapter.login(credentials).await?;
        self.storage.set_token(provider_type.as_str(), &session.token)?;
        if let Some(username) = &session.username {
            self.storage.set_username(username)?;
        }
        info!(provider = provider_type.as_str(), "login succeeded");
        Ok(())
    }

    /// Logs out of every provider that currently holds a stored token,
    /// then clears token storage entirely.
    pub async fn logout(&self) -> AuthResult<()> {
        for (provider_type, adapter) in &self.providers {
            if let Some(token) = self.storage.get_token_by_provider(provider_type.as_str())? {
                adapter.logout(&token).await?;
            }
        }
        self.storage.remove_all_tokens()?;
        debug!("logout cleared all stored tokens");
        Ok(())
    }

    /// True iff any configured provider's stored token currently
    /// validates.
    pub async fn is_authenticated(&self) -> AuthResult<bool> {
        for (provider_type, adapter) in &self.providers {
            let Some(token) = self.storage.get_token_by_provider(provider_type.as_str())? else { continue };
            match adapter.validate_token(&token).await {
                Ok(true) => return Ok(true),
                Ok(false) => continue,
                Err(err) => warn!(provider = provider_type.as_str(), error = %err, "token validation errored, treating as invalid"),
            }
        }
        Ok(false)
    }

    pub async fn validate_token(&self, provider_type: &AuthProviderType, token: &str) -> AuthResult<bool> {
        self.find(provider_type)?.validate_token(token).await
    }

    /// Completes `provider_type`'s redirect-based login flow and stores
    /// the resulting token.
    pub async fn handle_callback(&self, provider_type: &AuthProviderType, payload: &serde_json::Value) -> AuthResult<()> {
        let adapter = self.find(provider_type)?;
        let session = adapter.handle_callback(payload).await?;
        self.storage.set_token(provider_type.as_str(), &session.token)?;
        if let Some(username) = &session.username {
            self.storage.set_username(username)?;
        }
        Ok(())
    }
}
