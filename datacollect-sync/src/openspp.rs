//! Built-in [`ExternalSyncAdapter`] for an OpenSPP-style registry: a
//! three-tier `root -> household -> individual` hierarchy synced over
//! a plain REST API. Registered under `"openspp"` in
//! [`crate::external::ExternalAdapterRegistry::with_builtin_adapters`].
//!
//! Push filters events whose `data.entityName` names one of the three
//! configured tiers and issues creates in dependency order: every root
//! record first, then households (each linked to its root via
//! `data.parentGuid`), then individuals (linked to their household the
//! same way). A household or individual whose parent hasn't been pushed
//! yet (this round or a previous one) is reported as failed and retried
//! on the next push. Pull lists every record currently visible and
//! hands them back as [`ExternalRecord`]s for the coordinator to turn
//! into synthetic `create-*` events.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use datacollect_storage::EntityStore;
use datacollect_types::{EntityGuid, Event, EventTimestamp};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::external::{ExternalPushOutcome, ExternalRecord, ExternalSyncAdapter};

#[derive(Debug, Clone)]
pub struct OpenSppConfig {
    pub base_url: String,
    pub root_entity_name: String,
    pub household_entity_name: String,
    pub individual_entity_name: String,
}

impl OpenSppConfig {
    /// Reads tier names out of the adapter's free-form `settings`,
    /// falling back to OpenSPP's own defaults.
    #[must_use]
    pub fn from_settings(base_url: &str, settings: &serde_json::Value) -> Self {
        let field = |key: &str, default: &str| settings.get(key).and_then(|v| v.as_str()).unwrap_or(default).to_string();
        Self {
            base_url: base_url.to_string(),
            root_entity_name: field("rootEntityName", "root"),
            household_entity_name: field("householdEntityName", "household"),
            individual_entity_name: field("individualEntityName", "individual"),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    entity_name: &'a str,
    data: &'a serde_json::Value,
    parent_external_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    records: Vec<RemoteRecord>,
}

#[derive(Debug, Deserialize)]
struct RemoteRecord {
    id: String,
    entity_name: String,
    data: serde_json::Value,
    write_date: EventTimestamp,
}

pub struct OpenSppAdapter {
    client: reqwest::Client,
    config: OpenSppConfig,
    entity_store: Arc<EntityStore>,
    token: Mutex<Option<String>>,
}

impl OpenSppAdapter {
    #[must_use]
    pub fn new(config: OpenSppConfig, entity_store: Arc<EntityStore>) -> Self {
        Self { client: reqwest::Client::new(), config, entity_store, token: Mutex::new(None) }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn entity_name_of(event: &Event) -> Option<&str> {
        event.data.get("entityName").and_then(|v| v.as_str())
    }

    fn parent_guid_of(event: &Event) -> Option<EntityGuid> {
        event.data.get("parentGuid").and_then(|v| v.as_str()).and_then(|s| s.parse().ok())
    }

    async fn create_record(&self, entity_name: &str, data: &serde_json::Value, parent_external_id: Option<&str>) -> Result<String, String> {
        let token = self.token.lock().expect("openspp token lock poisoned").clone();
        let mut req = self.client.post(self.url("/api/records"));
        if let Some(t) = &token {
            req = req.bearer_auth(t);
        }
        let resp = req
            .json(&CreateRecordRequest { entity_name, data, parent_external_id })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let resp = resp.error_for_status().map_err(|e| e.to_string())?;
        let body: CreateRecordResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(body.id)
    }

    /// Resolves the external id already assigned to `event`'s parent
    /// entity, if any. `None` when the event has no parent link, or the
    /// parent hasn't itself been pushed yet.
    fn resolve_parent_external_id(&self, event: &Event) -> Option<String> {
        let parent_guid = Self::parent_guid_of(event)?;
        let pair = self.entity_store.get_entity(parent_guid).ok()??;
        pair.modified.common().external_id.clone()
    }

    fn push_one<'a>(&'a self, event: &'a Event) -> Option<std::pin::Pin<Box<dyn std::future::Future<Output = ExternalPushOutcome> + Send + 'a>>> {
        let entity_name = Self::entity_name_of(event)?.to_string();
        let is_root = entity_name == self.config.root_entity_name;

        Some(Box::pin(async move {
            let parent_external_id = if is_root { None } else { self.resolve_parent_external_id(event) };

            if !is_root && parent_external_id.is_none() {
                return ExternalPushOutcome {
                    event_guid: event.guid,
                    entity_guid: event.entity_guid,
                    result: Err("parent record has not been pushed yet".to_string()),
                };
            }

            match self.create_record(&entity_name, &event.data, parent_external_id.as_deref()).await {
                Ok(external_id) => ExternalPushOutcome { event_guid: event.guid, entity_guid: event.entity_guid, result: Ok(Some(external_id)) },
                Err(reason) => ExternalPushOutcome { event_guid: event.guid, entity_guid: event.entity_guid, result: Err(reason) },
            }
        }))
    }
}

#[async_trait]
impl ExternalSyncAdapter for OpenSppAdapter {
    async fn authenticate(&self, credentials: Option<&serde_json::Value>) -> SyncResult<()> {
        let Some(creds) = credentials else { return Ok(()) };
        let username = creds.get("username").and_then(|v| v.as_str());
        let password = creds.get("password").and_then(|v| v.as_str());
        let (Some(username), Some(password)) = (username, password) else { return Ok(()) };

        let resp: LoginResponse = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        *self.token.lock().expect("openspp token lock poisoned") = Some(resp.token);
        Ok(())
    }

    async fn push_data(&self, events: &[Event], _credentials: Option<&serde_json::Value>) -> SyncResult<Vec<ExternalPushOutcome>> {
        let tiers = [&self.config.root_entity_name, &self.config.household_entity_name, &self.config.individual_entity_name];
        let mut outcomes = Vec::with_capacity(events.len());

        // Root first, then household, then individual: each tier's
        // parent link resolves only once the tier above has a
        // server-assigned external id.
        for tier in tiers {
            for event in events {
                if Self::entity_name_of(event) != Some(tier.as_str()) {
                    continue;
                }
                if let Some(fut) = self.push_one(event) {
                    outcomes.push(fut.await);
                }
            }
        }

        // Events outside the three configured tiers are not this
        // adapter's concern; they still count as processed so the
        // coordinator's cursor advances past them.
        for event in events {
            if !tiers.iter().any(|t| Self::entity_name_of(event) == Some(t.as_str())) {
                outcomes.push(ExternalPushOutcome { event_guid: event.guid, entity_guid: event.entity_guid, result: Ok(None) });
            }
        }

        Ok(outcomes)
    }

    async fn pull_data(&self) -> SyncResult<Vec<ExternalRecord>> {
        let token = self.token.lock().expect("openspp token lock poisoned").clone();
        let mut req = self.client.get(self.url("/api/records"));
        if let Some(t) = &token {
            req = req.bearer_auth(t);
        }
        let resp: ListRecordsResponse = req.send().await?.error_for_status()?.json().await?;
        Ok(resp
            .records
            .into_iter()
            .map(|r| ExternalRecord { entity_name: r.entity_name, external_id: r.id, data: r.data, write_date: r.write_date })
            .collect())
    }
}
