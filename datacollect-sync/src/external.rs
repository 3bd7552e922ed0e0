//! The External Sync Coordinator: adapter-driven push/pull with a
//! foreign third-party system (e.g. OpenSPP), independent of and
//! running alongside the Internal Sync Coordinator's client/server
//! protocol. Maintains its own pair of cursors
//! (`lastPushExternalSync`/`lastPullExternalSync`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use datacollect_applier::{ApplierContext, ApplierRegistry, DuplicateDetectionConfig};
use datacollect_storage::{cursor_names, EntityStore, EventStore};
use datacollect_types::{Event, EventGuid, EventTimestamp, EventType, SyncLevel, TenantId, UserId};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

/// One record as returned by a foreign system's pull endpoint, destined
/// to become a synthetic `create-*` event.
#[derive(Debug, Clone)]
pub struct ExternalRecord {
    /// Which of the adapter's configured entity kinds this record is.
    pub entity_name: String,
    /// The foreign system's own identifier for this record.
    pub external_id: String,
    pub data: serde_json::Value,
    /// Server-authoritative last-write timestamp, assumed monotonic
    /// (clock-skew policy is out of scope — see DESIGN.md).
    pub write_date: EventTimestamp,
}

/// The outcome of pushing one local event to the foreign system.
pub struct ExternalPushOutcome {
    pub event_guid: EventGuid,
    pub entity_guid: datacollect_types::EntityGuid,
    /// `Ok(Some(external_id))` on a successful create. `Ok(None)` marks
    /// an event the adapter doesn't recognize (outside its configured
    /// entity kinds) — it still counts as processed so the cursor
    /// advances past it. `Err(reason)` is logged and the event is
    /// skipped for this push round; the cursor does not advance past it.
    pub result: Result<Option<String>, String>,
}

/// A pluggable foreign-system integration. One instance is constructed
/// per tenant by the adapter's factory in [`ExternalAdapterRegistry`].
#[async_trait]
pub trait ExternalSyncAdapter: Send + Sync {
    /// Establishes or refreshes whatever session/token the adapter
    /// needs; a no-op for adapters that don't require one.
    async fn authenticate(&self, credentials: Option<&serde_json::Value>) -> SyncResult<()>;

    /// Pushes `events` (already filtered and ordered by the coordinator
    /// is NOT assumed — the adapter is responsible for filtering events
    /// it doesn't recognize and for dependency ordering among the ones
    /// it does) to the foreign system.
    async fn push_data(&self, events: &[Event], credentials: Option<&serde_json::Value>) -> SyncResult<Vec<ExternalPushOutcome>>;

    /// Fetches every record currently visible to this adapter. The
    /// coordinator, not the adapter, filters by `write_date` against
    /// the local cursor — the foreign system here is not assumed to
    /// support its own pagination/cursoring.
    async fn pull_data(&self) -> SyncResult<Vec<ExternalRecord>>;

    /// Convenience: authenticate then report readiness. The coordinator
    /// calls `push_data`/`pull_data` directly rather than through this;
    /// it exists for callers that only want a connectivity check.
    async fn sync(&self, credentials: Option<&serde_json::Value>) -> SyncResult<()> {
        self.authenticate(credentials).await
    }
}

/// Everything a factory needs to build an adapter instance: the
/// deployment-chosen `type` string plus its free-form settings, and a
/// handle to the tenant's Entity Store so the adapter can maintain its
/// external-id mapping.
pub struct ExternalSyncAdapterConfig {
    pub adapter_type: String,
    pub base_url: String,
    pub settings: serde_json::Value,
}

type AdapterFactory = Box<dyn Fn(&ExternalSyncAdapterConfig, Arc<EntityStore>) -> Arc<dyn ExternalSyncAdapter> + Send + Sync>;

/// The `{type → factory}` mapping from §9: adding a new external system
/// is a registry insertion, not a core edit.
#[derive(Default)]
pub struct ExternalAdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl ExternalAdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in OpenSPP reference adapter registered
    /// under `"openspp"`.
    #[must_use]
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        registry.register("openspp", Box::new(|config, entity_store| {
            Arc::new(crate::openspp::OpenSppAdapter::new(crate::openspp::OpenSppConfig::from_settings(&config.base_url, &config.settings), entity_store)) as Arc<dyn ExternalSyncAdapter>
        }));
        registry
    }

    pub fn register(&mut self, adapter_type: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(adapter_type.into(), factory);
    }

    /// Instantiates the adapter named by `config.adapter_type`.
    pub fn build(&self, config: &ExternalSyncAdapterConfig, entity_store: Arc<EntityStore>) -> SyncResult<Arc<dyn ExternalSyncAdapter>> {
        let factory = self.factories.get(&config.adapter_type).ok_or_else(|| SyncError::UnknownAdapterType(config.adapter_type.clone()))?;
        Ok(factory(config, entity_store))
    }
}

#[derive(Debug, Clone)]
pub struct ExternalSyncConfig {
    pub page_size: usize,
}

impl Default for ExternalSyncConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// Runs push and pull independently against one constructed adapter,
/// maintaining `lastPushExternalSync`/`lastPullExternalSync` separately
/// from the Internal Sync Coordinator's cursors.
pub struct ExternalSyncCoordinator {
    event_store: Arc<EventStore>,
    entity_store: Arc<EntityStore>,
    appliers: Arc<ApplierRegistry>,
    duplicate_config: DuplicateDetectionConfig,
    adapter: Arc<dyn ExternalSyncAdapter>,
    config: ExternalSyncConfig,
    system_user: UserId,
    syncing: AsyncMutex<()>,
}

impl ExternalSyncCoordinator {
    #[must_use]
    pub fn new(event_store: Arc<EventStore>, entity_store: Arc<EntityStore>, appliers: Arc<ApplierRegistry>, duplicate_config: DuplicateDetectionConfig, adapter: Arc<dyn ExternalSyncAdapter>, config: ExternalSyncConfig) -> Self {
        Self {
            event_store,
            entity_store,
            appliers,
            duplicate_config,
            adapter,
            config,
            system_user: UserId::new(),
            syncing: AsyncMutex::new(()),
        }
    }

    /// Pushes local events accepted since `lastPushExternalSync`
    /// through the adapter, page by page. Per-record failures are
    /// logged and skipped; the cursor advances only over the
    /// successfully processed prefix of each page.
    pub async fn push(&self, credentials: Option<&serde_json::Value>) -> SyncResult<usize> {
        let _guard = self.syncing.try_lock().map_err(|_| SyncError::AlreadySyncing)?;
        self.adapter.authenticate(credentials).await?;

        let mut cursor = self.event_store.get_cursor(cursor_names::LAST_PUSH_EXTERNAL_SYNC)?.unwrap_or(EventTimestamp::epoch());
        let mut pushed = 0usize;

        loop {
            let (page, _) = self.event_store.get_events_since_pagination(cursor, self.config.page_size)?;
            if page.is_empty() {
                break;
            }

            let outcomes = self.adapter.push_data(&page, credentials).await?;
            let mut page_max: Option<EventTimestamp> = None;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(Some(external_id)) => {
                        self.entity_store.set_external_id(outcome.entity_guid, external_id)?;
                        if let Some(event) = page.iter().find(|e| e.guid == outcome.event_guid) {
                            page_max = Some(page_max.map_or(event.timestamp, |m| m.max(event.timestamp)));
                        }
                        pushed += 1;
                    }
                    Ok(None) => {
                        if let Some(event) = page.iter().find(|e| e.guid == outcome.event_guid) {
                            page_max = Some(page_max.map_or(event.timestamp, |m| m.max(event.timestamp)));
                        }
                    }
                    Err(reason) => {
                        warn!(event_guid = %outcome.event_guid, reason, "external push failed for record, skipping");
                    }
                }
            }

            self.event_store.update_sync_level_from_events(&outcomes.iter().filter(|o| matches!(o.result, Ok(Some(_)))).map(|o| o.event_guid).collect::<Vec<_>>(), SyncLevel::External)?;

            match page_max {
                Some(max_ts) => {
                    self.event_store.set_cursor(cursor_names::LAST_PUSH_EXTERNAL_SYNC, max_ts)?;
                    cursor = max_ts;
                }
                None => break, // nothing in this page succeeded; stop rather than spin
            }

            if page.len() < self.config.page_size {
                break;
            }
        }

        info!(pushed, "external push complete");
        Ok(pushed)
    }

    /// Pulls every record currently visible from the adapter, filters to
    /// ones newer than `lastPullExternalSync`, and applies each as a
    /// synthetic `create-*` event with `syncLevel = EXTERNAL`. A record
    /// whose `external_id` already maps to a local entity is treated as
    /// already applied (idempotent replay).
    pub async fn pull(&self) -> SyncResult<usize> {
        let _guard = self.syncing.try_lock().map_err(|_| SyncError::AlreadySyncing)?;
        self.adapter.authenticate(None).await?;

        let cursor = self.event_store.get_cursor(cursor_names::LAST_PULL_EXTERNAL_SYNC)?.unwrap_or(EventTimestamp::epoch());
        let mut records = self.adapter.pull_data().await?;
        records.retain(|r| r.write_date > cursor);
        records.sort_by_key(|r| r.write_date);

        let mut applied = 0usize;
        let mut max_ts = cursor;
        for record in &records {
            max_ts = max_ts.max(record.write_date);
            if self.entity_store.get_entity_by_external_id(&record.external_id)?.is_some() {
                continue; // already materialized locally from a prior pull
            }

            let entity_guid = datacollect_types::EntityGuid::new();
            let event_type: EventType = if record.entity_name == "individual" {
                datacollect_types::KnownEventType::CreateIndividual.into()
            } else {
                datacollect_types::KnownEventType::CreateGroup.into()
            };
            let event = Event::new(entity_guid, self.system_user, event_type, record.data.clone(), record.write_date);
            let mut event = event;
            event.sync_level = SyncLevel::External;

            self.event_store.save_event(&event)?;
            let ctx = ApplierContext::new(&self.entity_store, self.duplicate_config.clone());
            self.appliers.apply(&ctx, &event)?;
            self.entity_store.set_external_id(entity_guid, &record.external_id)?;
            applied += 1;
        }

        self.event_store.set_cursor(cursor_names::LAST_PULL_EXTERNAL_SYNC, max_ts)?;
        info!(applied, "external pull complete");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_types::{EntityGuid, KnownEventType};
    use std::sync::Mutex;

    struct FakeAdapter {
        pull_records: Mutex<Vec<ExternalRecord>>,
        push_behavior: Mutex<HashMap<EventGuid, Result<Option<String>, String>>>,
    }

    #[async_trait]
    impl ExternalSyncAdapter for FakeAdapter {
        async fn authenticate(&self, _credentials: Option<&serde_json::Value>) -> SyncResult<()> {
            Ok(())
        }

        async fn push_data(&self, events: &[Event], _credentials: Option<&serde_json::Value>) -> SyncResult<Vec<ExternalPushOutcome>> {
            let behavior = self.push_behavior.lock().unwrap();
            Ok(events
                .iter()
                .map(|e| ExternalPushOutcome {
                    event_guid: e.guid,
                    entity_guid: e.entity_guid,
                    result: behavior.get(&e.guid).cloned().unwrap_or_else(|| Ok(Some(format!("ext-{}", e.guid)))),
                })
                .collect())
        }

        async fn pull_data(&self) -> SyncResult<Vec<ExternalRecord>> {
            Ok(self.pull_records.lock().unwrap().clone())
        }
    }

    fn coordinator(adapter: Arc<FakeAdapter>) -> (ExternalSyncCoordinator, Arc<EventStore>, Arc<EntityStore>) {
        let tenant = TenantId::default();
        let event_store = Arc::new(EventStore::open_in_memory(tenant.clone()).unwrap());
        let entity_store = Arc::new(EntityStore::open_in_memory(tenant).unwrap());
        let coordinator = ExternalSyncCoordinator::new(
            event_store.clone(),
            entity_store.clone(),
            Arc::new(ApplierRegistry::with_builtin_appliers()),
            DuplicateDetectionConfig::default(),
            adapter,
            ExternalSyncConfig::default(),
        );
        (coordinator, event_store, entity_store)
    }

    #[tokio::test]
    async fn push_advances_cursor_and_records_external_id() {
        let adapter = Arc::new(FakeAdapter { pull_records: Mutex::new(Vec::new()), push_behavior: Mutex::new(HashMap::new()) });
        let (coordinator, event_store, entity_store) = coordinator(adapter);

        let guid = EntityGuid::new();
        let event = Event::new(guid, UserId::new(), KnownEventType::CreateIndividual, serde_json::json!({"name": "John", "entityName": "individual"}), EventTimestamp::now());
        event_store.save_event(&event).unwrap();
        entity_store.save_entity(&datacollect_model::EntityPair::fresh(datacollect_model::Entity::new_individual(guid, "John", serde_json::json!({}), EventTimestamp::now()))).unwrap();

        let pushed = coordinator.push(None).await.unwrap();
        assert_eq!(pushed, 1);
        assert!(entity_store.get_entity(guid).unwrap().unwrap().modified.common().external_id.is_some());
        assert!(event_store.get_cursor(cursor_names::LAST_PUSH_EXTERNAL_SYNC).unwrap().is_some());
    }

    #[tokio::test]
    async fn a_failed_record_is_skipped_and_does_not_advance_past_itself() {
        let guid_ok = EntityGuid::new();
        let guid_fail = EntityGuid::new();
        let mut behavior = HashMap::new();

        let adapter = Arc::new(FakeAdapter { pull_records: Mutex::new(Vec::new()), push_behavior: Mutex::new(HashMap::new()) });
        let (coordinator, event_store, entity_store) = coordinator(adapter.clone());

        let ts1 = EventTimestamp::now();
        let ts2 = ts1.next_millis();
        let event_fail = Event::new(guid_fail, UserId::new(), KnownEventType::CreateIndividual, serde_json::json!({"entityName": "individual"}), ts1);
        let event_ok = Event::new(guid_ok, UserId::new(), KnownEventType::CreateIndividual, serde_json::json!({"entityName": "individual"}), ts2);
        behavior.insert(event_fail.guid, Err("server rejected record".to_string()));
        *adapter.push_behavior.lock().unwrap() = behavior;

        event_store.save_event(&event_fail).unwrap();
        event_store.save_event(&event_ok).unwrap();
        for (g, e) in [(guid_fail, &event_fail), (guid_ok, &event_ok)] {
            entity_store.save_entity(&datacollect_model::EntityPair::fresh(datacollect_model::Entity::new_individual(g, "x", e.data.clone(), e.timestamp))).unwrap();
        }

        let pushed = coordinator.push(None).await.unwrap();
        assert_eq!(pushed, 1);
        assert!(entity_store.get_entity(guid_ok).unwrap().unwrap().modified.common().external_id.is_some());
        assert!(entity_store.get_entity(guid_fail).unwrap().unwrap().modified.common().external_id.is_none());
    }

    #[tokio::test]
    async fn pull_creates_synthetic_entities_and_is_idempotent_on_replay() {
        let record = ExternalRecord {
            entity_name: "individual".to_string(),
            external_id: "remote-1".to_string(),
            data: serde_json::json!({"name": "Jane"}),
            write_date: EventTimestamp::now(),
        };
        let adapter = Arc::new(FakeAdapter { pull_records: Mutex::new(vec![record]), push_behavior: Mutex::new(HashMap::new()) });
        let (coordinator, _event_store, entity_store) = coordinator(adapter);

        let applied = coordinator.pull().await.unwrap();
        assert_eq!(applied, 1);
        assert!(entity_store.get_entity_by_external_id("remote-1").unwrap().is_some());

        let applied_again = coordinator.pull().await.unwrap();
        assert_eq!(applied_again, 0);
        assert_eq!(entity_store.get_all_entities().unwrap().len(), 1);
    }
}
