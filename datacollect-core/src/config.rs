//! The deployment config artifact: a read-only JSON document consumed
//! once at engine construction. No loader or file-watcher is provided —
//! the caller owns fetching and deserializing it.

use serde::Deserialize;

use datacollect_auth::AuthConfig as AuthProviderConfig;
use datacollect_sync::ExternalSyncAdapterConfig;

/// One entity form definition, as handed to `datacollect-applier`'s
/// validation layer. Kept free-form (`serde_json::Value`) since form
/// schemas are deployment-defined.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityFormConfig {
    pub name: String,
    pub schema: serde_json::Value,
}

/// External sync deployment config: which adapter type to build and
/// its settings, mirroring [`ExternalSyncAdapterConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSyncConfig {
    pub adapter_type: String,
    pub base_url: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl From<&ExternalSyncConfig> for ExternalSyncAdapterConfig {
    fn from(cfg: &ExternalSyncConfig) -> Self {
        ExternalSyncAdapterConfig { adapter_type: cfg.adapter_type.clone(), base_url: cfg.base_url.clone(), settings: cfg.settings.clone() }
    }
}

/// One auth provider entry, mirroring [`AuthProviderConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfigEntry {
    pub provider_type: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl From<&AuthConfigEntry> for AuthProviderConfig {
    fn from(entry: &AuthConfigEntry) -> Self {
        AuthProviderConfig { provider_type: entry.provider_type.as_str().into(), fields: entry.fields.clone() }
    }
}

/// The deployment config artifact: `{id, name, version, entityForms[],
/// externalSync{}, authConfigs[], syncServerUrl}`. Deserialized once
/// and handed to [`crate::Engine::new`]; nothing in this crate mutates
/// or reloads it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub entity_forms: Vec<EntityFormConfig>,
    pub external_sync: Option<ExternalSyncConfig>,
    #[serde(default)]
    pub auth_configs: Vec<AuthConfigEntry>,
    pub sync_server_url: Option<String>,
}
