//! `SyncTransport`: the wire-level contract the Internal Sync
//! Coordinator speaks to the central server, modeled directly on §6's
//! HTTP surface. `HttpSyncTransport` is the real `reqwest`-backed
//! implementation; `InMemorySyncTransport` is an in-process fake used by
//! fast pagination/retry unit tests, grounded on the teacher's
//! `CloudStorage` async_trait shape in `cloud/storage.rs`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use datacollect_model::{AuditLogEntry, PotentialDuplicatePair};
use datacollect_types::{Event, EventGuid, EventTimestamp, TenantId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> SyncResult<(String, UserId)>;
    async fn push_events(&self, token: &str, config_id: &TenantId, events: &[Event]) -> SyncResult<Vec<EventGuid>>;
    async fn pull_events(&self, token: &str, config_id: &TenantId, since: EventTimestamp, limit: usize) -> SyncResult<(Vec<Event>, Option<EventTimestamp>)>;
    async fn push_audit(&self, token: &str, config_id: &TenantId, entries: &[AuditLogEntry]) -> SyncResult<()>;
    async fn pull_audit(&self, token: &str, config_id: &TenantId, since: EventTimestamp) -> SyncResult<Vec<AuditLogEntry>>;
    async fn get_potential_duplicates(&self, token: &str, config_id: &TenantId) -> SyncResult<Vec<PotentialDuplicatePair>>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushEventsRequest<'a> {
    events: &'a [Event],
    config_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushEventsResponse {
    accepted: Vec<EventGuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullEventsResponse {
    events: Vec<Event>,
    next_cursor: Option<EventTimestamp>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushAuditRequest<'a> {
    entries: &'a [AuditLogEntry],
    config_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullAuditResponse {
    entries: Vec<AuditLogEntry>,
}

#[derive(Debug, Deserialize)]
struct PotentialDuplicatesResponse {
    pairs: Vec<PotentialDuplicatePair>,
}

/// Real HTTP implementation of [`SyncTransport`], over `reqwest` with
/// `rustls-tls`, matching the teacher's exact feature selection.
pub struct HttpSyncTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSyncTransport {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn login(&self, username: &str, password: &str) -> SyncResult<(String, UserId)> {
        let resp: LoginResponse = self
            .client
            .post(self.url("/api/users/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok((resp.token, resp.user_id))
    }

    async fn push_events(&self, token: &str, config_id: &TenantId, events: &[Event]) -> SyncResult<Vec<EventGuid>> {
        let resp: PushEventsResponse = self
            .client
            .post(self.url("/api/sync/push"))
            .bearer_auth(token)
            .json(&PushEventsRequest { events, config_id: config_id.as_str() })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.accepted)
    }

    async fn pull_events(&self, token: &str, config_id: &TenantId, since: EventTimestamp, limit: usize) -> SyncResult<(Vec<Event>, Option<EventTimestamp>)> {
        let resp: PullEventsResponse = self
            .client
            .get(self.url("/api/sync/pull"))
            .bearer_auth(token)
            .query(&[("since", since.to_rfc3339()), ("limit", limit.to_string()), ("configId", config_id.as_str().to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok((resp.events, resp.next_cursor))
    }

    async fn push_audit(&self, token: &str, config_id: &TenantId, entries: &[AuditLogEntry]) -> SyncResult<()> {
        self.client
            .post(self.url("/api/sync/audit/push"))
            .bearer_auth(token)
            .json(&PushAuditRequest { entries, config_id: config_id.as_str() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn pull_audit(&self, token: &str, config_id: &TenantId, since: EventTimestamp) -> SyncResult<Vec<AuditLogEntry>> {
        let resp: PullAuditResponse = self
            .client
            .get(self.url("/api/sync/audit/pull"))
            .bearer_auth(token)
            .query(&[("since", since.to_rfc3339()), ("configId", config_id.as_str().to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.entries)
    }

    async fn get_potential_duplicates(&self, token: &str, config_id: &TenantId) -> SyncResult<Vec<PotentialDuplicatePair>> {
        let resp: PotentialDuplicatesResponse = self
            .client
            .get(self.url("/api/potential-duplicates"))
            .bearer_auth(token)
            .query(&[("configId", config_id.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.pairs)
    }
}

/// In-process fake server, for fast pagination/retry/idempotence unit
/// tests that don't need a real HTTP round trip. `wiremock`-backed
/// integration tests exercise `HttpSyncTransport` itself.
#[derive(Default)]
pub struct InMemorySyncTransport {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    events: Vec<Event>,
    audit: Vec<AuditLogEntry>,
    duplicates: Vec<PotentialDuplicatePair>,
    tokens: HashMap<String, UserId>,
    fail_next_push: u32,
}

impl InMemorySyncTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds events the fake server already holds (as if pushed by
    /// another device), for pull-side tests.
    pub fn seed_events(&self, events: Vec<Event>) {
        self.state.lock().unwrap().events.extend(events);
    }

    pub fn seed_duplicates(&self, pairs: Vec<PotentialDuplicatePair>) {
        self.state.lock().unwrap().duplicates.extend(pairs);
    }

    /// Makes the next `n` `push_events` calls fail, to exercise retry.
    pub fn fail_next_pushes(&self, n: u32) {
        self.state.lock().unwrap().fail_next_push = n;
    }

    pub fn pushed_events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl SyncTransport for InMemorySyncTransport {
    async fn login(&self, username: &str, _password: &str) -> SyncResult<(String, UserId)> {
        let user_id = UserId::new();
        let token = format!("token-{username}");
        self.state.lock().unwrap().tokens.insert(token.clone(), user_id);
        Ok((token, user_id))
    }

    async fn push_events(&self, _token: &str, _config_id: &TenantId, events: &[Event]) -> SyncResult<Vec<EventGuid>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_push > 0 {
            state.fail_next_push -= 1;
            return Err(SyncError::PushFailed("simulated transport failure".to_string()));
        }
        let mut accepted = Vec::with_capacity(events.len());
        for event in events {
            if !state.events.iter().any(|e| e.guid == event.guid) {
                state.events.push(event.clone());
            }
            accepted.push(event.guid);
        }
        Ok(accepted)
    }

    async fn pull_events(&self, _token: &str, _config_id: &TenantId, since: EventTimestamp, limit: usize) -> SyncResult<(Vec<Event>, Option<EventTimestamp>)> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Event> = state.events.iter().filter(|e| e.timestamp > since).cloned().collect();
        matching.sort_by_key(|e| e.timestamp);
        matching.truncate(limit);
        let next_cursor = matching.last().map(|e| e.timestamp);
        Ok((matching, next_cursor))
    }

    async fn push_audit(&self, _token: &str, _config_id: &TenantId, entries: &[AuditLogEntry]) -> SyncResult<()> {
        self.state.lock().unwrap().audit.extend(entries.iter().cloned());
        Ok(())
    }

    async fn pull_audit(&self, _token: &str, _config_id: &TenantId, since: EventTimestamp) -> SyncResult<Vec<AuditLogEntry>> {
        Ok(self.state.lock().unwrap().audit.iter().filter(|a| a.timestamp > since).cloned().collect())
    }

    async fn get_potential_duplicates(&self, _token: &str, _config_id: &TenantId) -> SyncResult<Vec<PotentialDuplicatePair>> {
        Ok(self.state.lock().unwrap().duplicates.clone())
    }
}
