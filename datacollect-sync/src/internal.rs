//! The Internal Sync Coordinator: a two-phase, paginated, resumable
//! push/pull protocol between one client and the central server.
//!
//! Phase 1 pushes local events (and the audit entries they produced) up
//! to the server, advancing `lastLocalSync`. Phase 2 pulls remote
//! events down, replays them through the Event Applier, and advances
//! `lastRemoteSync`. Both phases are page-at-a-time so a crash or
//! cancellation mid-sync resumes cleanly from the last completed page.

use std::sync::Arc;

use datacollect_applier::{ApplierContext, ApplierRegistry, DuplicateDetectionConfig};
use datacollect_storage::{cursor_names, AuthStorageAdapter, EntityStore, EventStore};
use datacollect_types::{Event, EventTimestamp, SyncLevel, TenantId};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::cancellation::CancellationToken;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;

/// Tunables for one coordinator instance: page size and retry policy.
#[derive(Debug, Clone)]
pub struct InternalSyncConfig {
    pub page_size: usize,
    pub backoff: Backoff,
}

impl Default for InternalSyncConfig {
    fn default() -> Self {
        Self { page_size: 10, backoff: Backoff::default() }
    }
}

/// Counts of events moved in each direction by one `synchronize` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub pushed: usize,
    pub pulled: usize,
}

/// Runs the push/pull protocol for one tenant against one server,
/// sharing the tenant's `EventStore`/`EntityStore` with the rest of the
/// engine and the `AuthStorageAdapter` with the Auth Manager.
pub struct InternalSyncCoordinator {
    tenant_id: TenantId,
    event_store: Arc<EventStore>,
    entity_store: Arc<EntityStore>,
    appliers: Arc<ApplierRegistry>,
    duplicate_config: DuplicateDetectionConfig,
    transport: Arc<dyn SyncTransport>,
    auth_store: Arc<dyn AuthStorageAdapter>,
    config: InternalSyncConfig,
    /// Guards reentrant `synchronize` calls for this tenant; `try_lock`
    /// realizes "a second call returns `AlreadySyncing` immediately"
    /// rather than queuing behind the in-flight sync.
    syncing: AsyncMutex<()>,
}

impl InternalSyncCoordinator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        event_store: Arc<EventStore>,
        entity_store: Arc<EntityStore>,
        appliers: Arc<ApplierRegistry>,
        duplicate_config: DuplicateDetectionConfig,
        transport: Arc<dyn SyncTransport>,
        auth_store: Arc<dyn AuthStorageAdapter>,
        config: InternalSyncConfig,
    ) -> Self {
        Self {
            tenant_id,
            event_store,
            entity_store,
            appliers,
            duplicate_config,
            transport,
            auth_store,
            config,
            syncing: AsyncMutex::new(()),
        }
    }

    /// Runs both phases. Fails fast with `DuplicatesBlockSync` if any
    /// potential duplicate is unresolved, and with `AuthRequired` if no
    /// token is stored. The `syncing` guard is held for the whole call,
    /// released on every return path including error.
    pub async fn synchronize(&self, cancel: &CancellationToken) -> SyncResult<SyncSummary> {
        let _guard = self.syncing.try_lock().map_err(|_| SyncError::AlreadySyncing)?;

        if !self.entity_store.get_potential_duplicates()?.is_empty() {
            return Err(SyncError::DuplicatesBlockSync);
        }

        // The coordinator never caches the token beyond one request —
        // it is re-read from auth storage for each phase.
        let token = self.auth_store.get_token()?.ok_or(SyncError::AuthRequired)?;

        let pushed = self.push_phase(&token, cancel).await?;
        let token = self.auth_store.get_token()?.ok_or(SyncError::AuthRequired)?;
        let pulled = self.pull_phase(&token, cancel).await?;

        Ok(SyncSummary { pushed, pulled })
    }

    async fn push_phase(&self, token: &str, cancel: &CancellationToken) -> SyncResult<usize> {
        let mut cursor = self.event_store.get_cursor(cursor_names::LAST_LOCAL_SYNC)?.unwrap_or(EventTimestamp::epoch());
        let mut pushed = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let (page, _) = self.event_store.get_events_since_pagination(cursor, self.config.page_size)?;
            if page.is_empty() {
                break;
            }

            let accepted = self.push_page_with_retry(token, &page).await?;
            if accepted.is_empty() {
                break;
            }

            let max_ts = page.iter().filter(|e| accepted.contains(&e.guid)).map(|e| e.timestamp).max().expect("accepted is non-empty");
            self.event_store.update_sync_level_from_events(&accepted, SyncLevel::Remote)?;
            self.event_store.set_cursor(cursor_names::LAST_LOCAL_SYNC, max_ts)?;
            cursor = max_ts;
            pushed += accepted.len();

            if page.len() < self.config.page_size {
                break;
            }
        }

        self.push_audit_trail(token).await?;
        Ok(pushed)
    }

    async fn push_page_with_retry(&self, token: &str, page: &[Event]) -> SyncResult<Vec<datacollect_types::EventGuid>> {
        let mut attempt = 0;
        loop {
            match self.transport.push_events(token, &self.tenant_id, page).await {
                Ok(accepted) => return Ok(accepted),
                Err(err) if attempt < self.config.backoff.max_attempts => {
                    warn!(attempt, error = %err, "push page failed, retrying");
                    tokio::time::sleep(self.config.backoff.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(SyncError::PushFailed(err.to_string())),
            }
        }
    }

    async fn push_audit_trail(&self, token: &str) -> SyncResult<()> {
        let since = self.event_store.get_cursor(cursor_names::LAST_LOCAL_SYNC)?.unwrap_or(EventTimestamp::epoch());
        let entries = self.event_store.get_audit_logs_since(since)?;
        if !entries.is_empty() {
            self.transport.push_audit(token, &self.tenant_id, &entries).await?;
        }
        Ok(())
    }

    async fn pull_phase(&self, token: &str, cancel: &CancellationToken) -> SyncResult<usize> {
        let mut cursor = self.event_store.get_cursor(cursor_names::LAST_REMOTE_SYNC)?.unwrap_or(EventTimestamp::epoch());
        let mut pulled = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let (page, next_cursor) = self.transport.pull_events(token, &self.tenant_id, cursor, self.config.page_size).await?;
            if page.is_empty() {
                break;
            }

            let mut max_ts = cursor;
            for mut event in page {
                if self.event_store.event_exists(event.guid)? {
                    debug!(guid = %event.guid, "pull: event already present, skipping");
                    continue;
                }
                event.sync_level = SyncLevel::Remote;
                max_ts = max_ts.max(event.timestamp);
                self.event_store.save_event(&event)?;
                let ctx = ApplierContext::new(&self.entity_store, self.duplicate_config.clone());
                self.appliers.apply(&ctx, &event)?;
                pulled += 1;
            }

            self.event_store.set_cursor(cursor_names::LAST_REMOTE_SYNC, max_ts)?;
            cursor = max_ts;

            match next_cursor {
                Some(_) => {}
                None => break,
            }
        }

        self.pull_audit_trail(token).await?;
        info!(pulled, tenant = %self.tenant_id, "pull phase complete");
        Ok(pulled)
    }

    async fn pull_audit_trail(&self, token: &str) -> SyncResult<()> {
        let since = self.event_store.get_cursor(cursor_names::LAST_REMOTE_SYNC)?.unwrap_or(EventTimestamp::epoch());
        let entries = self.transport.pull_audit(token, &self.tenant_id, since).await?;
        if !entries.is_empty() {
            self.event_store.save_audit_logs(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_model::EntityPair;
    use datacollect_storage::SqliteAuthStore;
    use datacollect_types::{EntityGuid, KnownEventType, UserId};

    use crate::transport::InMemorySyncTransport;

    fn coordinator(transport: Arc<InMemorySyncTransport>) -> (InternalSyncCoordinator, Arc<EventStore>, Arc<EntityStore>) {
        let tenant = TenantId::default();
        let event_store = Arc::new(EventStore::open_in_memory(tenant.clone()).unwrap());
        let entity_store = Arc::new(EntityStore::open_in_memory(tenant.clone()).unwrap());
        let auth = Arc::new(SqliteAuthStore::open_in_memory(tenant.clone()).unwrap());
        auth.set_token("basic", "test-token").unwrap();
        let coordinator = InternalSyncCoordinator::new(
            tenant,
            event_store.clone(),
            entity_store.clone(),
            Arc::new(ApplierRegistry::with_builtin_appliers()),
            DuplicateDetectionConfig::default(),
            transport,
            auth,
            InternalSyncConfig { page_size: 10, backoff: Backoff::default() },
        );
        (coordinator, event_store, entity_store)
    }

    fn create_event(entity_guid: EntityGuid, ts: EventTimestamp) -> Event {
        Event::new(entity_guid, UserId::new(), KnownEventType::CreateIndividual, serde_json::json!({"name": "John"}), ts)
    }

    #[tokio::test]
    async fn push_phase_advances_local_cursor_and_upgrades_sync_level() {
        let transport = Arc::new(InMemorySyncTransport::new());
        let (coordinator, event_store, _entity_store) = coordinator(transport.clone());

        let event = create_event(EntityGuid::new(), EventTimestamp::now());
        event_store.save_event(&event).unwrap();

        let summary = coordinator.synchronize(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.pushed, 1);
        assert_eq!(transport.pushed_events().len(), 1);

        let all = event_store.get_all_events().unwrap();
        assert_eq!(all[0].sync_level, SyncLevel::Remote);
        assert!(event_store.get_cursor(cursor_names::LAST_LOCAL_SYNC).unwrap().is_some());
    }

    #[tokio::test]
    async fn pull_phase_applies_remote_events_and_is_idempotent_on_replay() {
        let transport = Arc::new(InMemorySyncTransport::new());
        let guid = EntityGuid::new();
        let remote_event = create_event(guid, EventTimestamp::now());
        transport.seed_events(vec![remote_event]);

        let (coordinator, event_store, entity_store) = coordinator(transport.clone());
        let summary = coordinator.synchronize(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.pulled, 1);
        assert!(entity_store.entity_exists(guid).unwrap());

        // Replaying the same page (a second full sync) must not duplicate
        // the event or its projected entity.
        let summary2 = coordinator.synchronize(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary2.pulled, 0);
        assert_eq!(event_store.get_all_events().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn push_retries_then_succeeds_within_the_backoff_budget() {
        let transport = Arc::new(InMemorySyncTransport::new());
        transport.fail_next_pushes(2);
        let (coordinator, event_store, _) = coordinator(transport.clone());
        event_store.save_event(&create_event(EntityGuid::new(), EventTimestamp::now())).unwrap();

        let summary = coordinator.synchronize(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.pushed, 1);
    }

    #[tokio::test]
    async fn push_fails_after_exhausting_retries() {
        let transport = Arc::new(InMemorySyncTransport::new());
        transport.fail_next_pushes(10);
        let (coordinator, event_store, _) = coordinator(transport.clone());
        event_store.save_event(&create_event(EntityGuid::new(), EventTimestamp::now())).unwrap();

        let err = coordinator.synchronize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::PushFailed(_)));
    }

    #[tokio::test]
    async fn sync_is_blocked_while_potential_duplicates_are_unresolved() {
        use datacollect_model::{Entity, PotentialDuplicatePair};

        let transport = Arc::new(InMemorySyncTransport::new());
        let (coordinator, _event_store, entity_store) = coordinator(transport);
        let a = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({}), EventTimestamp::now());
        let b = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({}), EventTimestamp::now());
        entity_store.save_entity(&EntityPair::fresh(a.clone())).unwrap();
        entity_store.save_entity(&EntityPair::fresh(b.clone())).unwrap();
        entity_store.save_potential_duplicates(&[PotentialDuplicatePair::canonical(a.guid(), b.guid())]).unwrap();

        let before = entity_store.get_potential_duplicates().unwrap();
        let err = coordinator.synchronize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::DuplicatesBlockSync));
        assert_eq!(entity_store.get_potential_duplicates().unwrap(), before);
    }

    #[tokio::test]
    async fn a_cancelled_pull_does_not_corrupt_the_cursor() {
        let transport = Arc::new(InMemorySyncTransport::new());
        let mut ts = EventTimestamp::now();
        let mut events = Vec::new();
        for _ in 0..3 {
            ts = ts.next_millis();
            events.push(create_event(EntityGuid::new(), ts));
        }
        transport.seed_events(events);

        let (coordinator, event_store, _entity_store) = coordinator(transport);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = coordinator.synchronize(&cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert!(event_store.get_cursor(cursor_names::LAST_REMOTE_SYNC).unwrap().is_none());
    }

    #[tokio::test]
    async fn a_second_concurrent_sync_is_rejected_immediately() {
        let transport = Arc::new(InMemorySyncTransport::new());
        let (coordinator, _, _) = coordinator(transport);
        let _guard = coordinator.syncing.try_lock().unwrap();
        let err = coordinator.synchronize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::AlreadySyncing));
    }
}
