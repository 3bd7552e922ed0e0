//! The facade crate: wires the Event Store, Entity Store, Event
//! Applier Service, Internal Sync Coordinator, External Sync
//! Coordinator, and Auth Manager into one [`Engine`], and hosts the
//! integration-test surface for the engine's end-to-end scenarios.

pub mod config;
mod error;

use std::path::Path;
use std::sync::Arc;

use datacollect_applier::{ApplierContext, ApplierRegistry, DuplicateDetectionConfig};
use datacollect_auth::{AuthAdapterRegistry, AuthManager};
use datacollect_model::{EntityPair, PotentialDuplicatePair};
use datacollect_storage::{AuthStorageAdapter, EntityStore, SqliteAuthStore};
use datacollect_storage::{EventStore, SearchQuery};
use datacollect_sync::{ExternalAdapterRegistry, ExternalSyncCoordinator, InternalSyncConfig, InternalSyncCoordinator, SyncTransport};
use datacollect_types::{Event, EntityGuid, EventGuid, TenantId};

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};

/// One running deployment: the storage layer, the applier registry,
/// and whichever sync/auth machinery the config wired up. Cheap to
/// clone (everything inside is `Arc`-shared) so callers can hand it to
/// multiple tasks.
#[derive(Clone)]
pub struct Engine {
    tenant_id: TenantId,
    event_store: Arc<EventStore>,
    entity_store: Arc<EntityStore>,
    appliers: Arc<ApplierRegistry>,
    duplicate_config: DuplicateDetectionConfig,
    auth_store: Arc<dyn AuthStorageAdapter>,
    internal_sync: Option<Arc<InternalSyncCoordinator>>,
    external_sync: Option<Arc<ExternalSyncCoordinator>>,
    auth: Arc<AuthManager>,
}

impl Engine {
    /// Opens (creating if absent) the on-disk stores for `tenant_id`
    /// under `data_dir`, and wires sync/auth per `config`.
    pub fn open(data_dir: &Path, tenant_id: TenantId, config: &EngineConfig, transport: Option<Arc<dyn SyncTransport>>) -> EngineResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(datacollect_storage::StorageError::from)?;
        let event_store = Arc::new(EventStore::open(&data_dir.join("events.duckdb"), tenant_id.clone())?);
        let entity_store = Arc::new(EntityStore::open(&data_dir.join("entities.duckdb"), tenant_id.clone())?);
        let auth_store: Arc<dyn AuthStorageAdapter> = Arc::new(SqliteAuthStore::open(&data_dir.join("auth.sqlite"), tenant_id.clone())?);
        Self::wire(tenant_id, event_store, entity_store, auth_store, config, transport)
    }

    /// Builds an engine over in-memory stores, for tests and
    /// short-lived tooling.
    pub fn open_in_memory(tenant_id: TenantId, config: &EngineConfig, transport: Option<Arc<dyn SyncTransport>>) -> EngineResult<Self> {
        let event_store = Arc::new(EventStore::open_in_memory(tenant_id.clone())?);
        let entity_store = Arc::new(EntityStore::open_in_memory(tenant_id.clone())?);
        let auth_store: Arc<dyn AuthStorageAdapter> = Arc::new(SqliteAuthStore::open_in_memory(tenant_id.clone())?);
        Self::wire(tenant_id, event_store, entity_store, auth_store, config, transport)
    }

    fn wire(
        tenant_id: TenantId,
        event_store: Arc<EventStore>,
        entity_store: Arc<EntityStore>,
        auth_store: Arc<dyn AuthStorageAdapter>,
        config: &EngineConfig,
        transport: Option<Arc<dyn SyncTransport>>,
    ) -> EngineResult<Self> {
        let appliers = Arc::new(ApplierRegistry::with_builtin_appliers());
        let duplicate_config = DuplicateDetectionConfig::default();

        let internal_sync = transport.map(|transport| {
            Arc::new(InternalSyncCoordinator::new(
                tenant_id.clone(),
                event_store.clone(),
                entity_store.clone(),
                appliers.clone(),
                duplicate_config.clone(),
                transport,
                auth_store.clone(),
                InternalSyncConfig::default(),
            ))
        });

        let external_sync = match &config.external_sync {
            Some(external_config) => {
                let registry = ExternalAdapterRegistry::with_builtin_adapters();
                let adapter_config = external_config.into();
                let adapter = registry.build(&adapter_config, entity_store.clone())?;
                Some(Arc::new(ExternalSyncCoordinator::new(
                    event_store.clone(),
                    entity_store.clone(),
                    appliers.clone(),
                    duplicate_config.clone(),
                    adapter,
                    Default::default(),
                )))
            }
            None => None,
        };

        let auth_registry = AuthAdapterRegistry::with_builtin_adapters();
        let provider_configs: Vec<_> = config.auth_configs.iter().map(Into::into).collect();
        let auth = Arc::new(AuthManager::from_configs(auth_store.clone(), &provider_configs, &auth_registry)?);

        Ok(Self { tenant_id, event_store, entity_store, appliers, duplicate_config, auth_store, internal_sync, external_sync, auth })
    }

    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    #[must_use]
    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.event_store
    }

    #[must_use]
    pub fn entity_store(&self) -> &Arc<EntityStore> {
        &self.entity_store
    }

    #[must_use]
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    #[must_use]
    pub fn auth_store(&self) -> &Arc<dyn AuthStorageAdapter> {
        &self.auth_store
    }

    #[must_use]
    pub fn internal_sync(&self) -> Option<&Arc<InternalSyncCoordinator>> {
        self.internal_sync.as_ref()
    }

    #[must_use]
    pub fn external_sync(&self) -> Option<&Arc<ExternalSyncCoordinator>> {
        self.external_sync.as_ref()
    }

    /// Appends `event` to the log and replays it through the applier
    /// registry, returning the projected entity state it produced.
    pub fn submit(&self, event: Event) -> EngineResult<datacollect_applier::Outcome> {
        self.event_store.save_event(&event)?;
        let ctx = ApplierContext::new(&self.entity_store, self.duplicate_config.clone());
        Ok(self.appliers.apply(&ctx, &event)?)
    }

    pub fn get_entity(&self, guid: EntityGuid) -> EngineResult<Option<EntityPair>> {
        Ok(self.entity_store.get_entity(guid)?)
    }

    pub fn search_entities(&self, query: &SearchQuery) -> EngineResult<Vec<EntityPair>> {
        Ok(self.entity_store.search_entities(query)?)
    }

    pub fn get_potential_duplicates(&self) -> EngineResult<Vec<PotentialDuplicatePair>> {
        Ok(self.entity_store.get_potential_duplicates()?)
    }

    #[must_use]
    pub fn merkle_root(&self) -> String {
        self.event_store.merkle_root()
    }

    pub fn merkle_proof(&self, guid: EventGuid) -> Option<Vec<datacollect_merkle::Hash>> {
        self.event_store.merkle_proof(guid)
    }

    #[must_use]
    pub fn verify_event(&self, guid: EventGuid, proof: &[datacollect_merkle::Hash], expected_root: &str) -> bool {
        self.event_store.verify_event(guid, proof, expected_root)
    }
}

