//! The `EventStorageAdapter` contract, a DuckDB-backed reference
//! implementation covering the embedded local case, and the [`EventStore`]
//! that wraps an adapter together with the in-memory [`MerkleLog`] the
//! adapter's node cache must always agree with. A remote
//! relational/JSON-document implementation is left to the trait only —
//! concrete remote backends are outside this engine's scope.

use std::sync::{Arc, Mutex};

use datacollect_merkle::{Hash, MerkleLog};
use datacollect_model::AuditLogEntry;
use datacollect_types::{EntityGuid, Event, EventGuid, EventTimestamp, SyncLevel, TenantId};
use duckdb::{params, Connection};

use crate::error::{StorageError, StorageResult};

/// Persists the immutable event log, the audit trail derived from it,
/// the cached Merkle node hashes, and the per-tenant sync cursors.
///
/// All writes for one tenant are expected to be serialized by the
/// caller (the Event Store proper, one layer up) — this trait makes no
/// locking guarantee of its own beyond what the underlying connection
/// provides.
pub trait EventStorageAdapter: Send + Sync {
    fn init(&self) -> StorageResult<()>;
    fn save_event(&self, event: &Event) -> StorageResult<i64>;
    fn get_events(&self) -> StorageResult<Vec<Event>>;
    fn get_all_events(&self) -> StorageResult<Vec<Event>>;
    fn event_exists(&self, guid: EventGuid) -> StorageResult<bool>;
    fn get_events_since(&self, ts: EventTimestamp) -> StorageResult<Vec<Event>>;
    fn get_events_since_pagination(&self, ts: EventTimestamp, limit: usize) -> StorageResult<(Vec<Event>, Option<EventTimestamp>)>;
    fn update_event_sync_level(&self, guid: EventGuid, level: SyncLevel) -> StorageResult<()>;
    fn update_sync_level_from_events(&self, guids: &[EventGuid], level: SyncLevel) -> StorageResult<()>;
    fn save_audit_log(&self, entry: &AuditLogEntry) -> StorageResult<()>;
    fn save_audit_logs(&self, entries: &[AuditLogEntry]) -> StorageResult<()>;
    fn get_audit_logs_since(&self, ts: EventTimestamp) -> StorageResult<Vec<AuditLogEntry>>;
    fn get_audit_trail_by_entity_guid(&self, guid: datacollect_types::EntityGuid) -> StorageResult<Vec<AuditLogEntry>>;
    fn get_merkle_nodes(&self) -> StorageResult<Vec<(i64, String)>>;
    fn save_merkle_nodes(&self, nodes: &[(i64, String)]) -> StorageResult<()>;
    fn get_cursor(&self, name: &str) -> StorageResult<Option<EventTimestamp>>;
    fn set_cursor(&self, name: &str, ts: EventTimestamp) -> StorageResult<()>;
    fn clear(&self) -> StorageResult<()>;
    fn close(&self) -> StorageResult<()>;
}

/// DuckDB-backed reference implementation of [`EventStorageAdapter`].
///
/// Tenant isolation is a `tenantId` column filtered into every query —
/// all rows for every tenant share one physical table.
pub struct DuckDbEventStore {
    conn: Arc<Mutex<Connection>>,
    tenant_id: TenantId,
}

impl DuckDbEventStore {
    /// Opens (or creates) an event store backed by the file at `path`.
    pub fn open(path: &std::path::Path, tenant_id: TenantId) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), tenant_id };
        store.init()?;
        Ok(store)
    }

    /// Opens an in-memory event store (tests, ephemeral sessions).
    pub fn open_in_memory(tenant_id: TenantId) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), tenant_id };
        store.init()?;
        Ok(store)
    }

    fn row_to_event(guid: String, entity_guid: String, event_type: String, data: String, timestamp: String, user_id: String, sync_level: String) -> StorageResult<Event> {
        Ok(Event {
            guid: guid.parse().map_err(|e| StorageError::InvalidData(format!("bad event guid: {e}")))?,
            entity_guid: entity_guid.parse().map_err(|e| StorageError::InvalidData(format!("bad entity guid: {e}")))?,
            event_type: event_type.into(),
            data: serde_json::from_str(&data)?,
            timestamp: EventTimestamp::parse(&timestamp).map_err(|e| StorageError::InvalidData(format!("bad timestamp: {e}")))?,
            user_id: user_id.parse().map_err(|e| StorageError::InvalidData(format!("bad user id: {e}")))?,
            sync_level: parse_sync_level(&sync_level),
        })
    }
}

fn parse_sync_level(s: &str) -> SyncLevel {
    match s {
        "REMOTE" => SyncLevel::Remote,
        "EXTERNAL" => SyncLevel::External,
        _ => SyncLevel::Local,
    }
}

fn sync_level_str(level: SyncLevel) -> &'static str {
    match level {
        SyncLevel::Local => "LOCAL",
        SyncLevel::Remote => "REMOTE",
        SyncLevel::External => "EXTERNAL",
    }
}

impl EventStorageAdapter for DuckDbEventStore {
    fn init(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS events (
                row_id BIGINT PRIMARY KEY,
                guid TEXT NOT NULL,
                entity_guid TEXT NOT NULL,
                type TEXT NOT NULL,
                data TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_id TEXT NOT NULL,
                sync_level TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                UNIQUE(guid, tenant_id)
            );
            CREATE SEQUENCE IF NOT EXISTS events_row_id_seq START 1;

            CREATE TABLE IF NOT EXISTS audit (
                guid TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                event_guid TEXT NOT NULL,
                entity_guid TEXT NOT NULL,
                changes TEXT NOT NULL,
                signature TEXT NOT NULL,
                sync_level TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (guid, tenant_id)
            );

            CREATE TABLE IF NOT EXISTS merkle_nodes (
                idx BIGINT NOT NULL,
                hash TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (idx, tenant_id)
            );

            CREATE TABLE IF NOT EXISTS sync_cursors (
                name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (name, tenant_id)
            );
            ",
        )?;
        Ok(())
    }

    fn save_event(&self, event: &Event) -> StorageResult<i64> {
        let conn = self.conn.lock().unwrap();
        let data = serde_json::to_string(&event.data)?;
        conn.execute(
            "INSERT INTO events (row_id, guid, entity_guid, type, data, timestamp, user_id, sync_level, tenant_id)
             VALUES (nextval('events_row_id_seq'), ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (guid, tenant_id) DO NOTHING",
            params![
                event.guid.to_string(),
                event.entity_guid.to_string(),
                event.event_type.as_str(),
                data,
                event.timestamp.to_rfc3339(),
                event.user_id.to_string(),
                sync_level_str(event.sync_level),
                self.tenant_id.as_str(),
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT row_id FROM events WHERE guid = ?1 AND tenant_id = ?2",
            params![event.guid.to_string(), self.tenant_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_events(&self) -> StorageResult<Vec<Event>> {
        self.get_all_events()
    }

    fn get_all_events(&self) -> StorageResult<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guid, entity_guid, type, data, timestamp, user_id, sync_level FROM events
             WHERE tenant_id = ?1 ORDER BY timestamp ASC, guid ASC",
        )?;
        let rows = stmt.query_map(params![self.tenant_id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?, row.get::<_, String>(4)?, row.get::<_, String>(5)?, row.get::<_, String>(6)?))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (guid, entity_guid, event_type, data, timestamp, user_id, sync_level) = row?;
            events.push(Self::row_to_event(guid, entity_guid, event_type, data, timestamp, user_id, sync_level)?);
        }
        Ok(events)
    }

    fn event_exists(&self, guid: EventGuid) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE guid = ?1 AND tenant_id = ?2",
            params![guid.to_string(), self.tenant_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_events_since(&self, ts: EventTimestamp) -> StorageResult<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guid, entity_guid, type, data, timestamp, user_id, sync_level FROM events
             WHERE tenant_id = ?1 AND timestamp > ?2 ORDER BY timestamp ASC, guid ASC",
        )?;
        let rows = stmt.query_map(params![self.tenant_id.as_str(), ts.to_rfc3339()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?, row.get::<_, String>(4)?, row.get::<_, String>(5)?, row.get::<_, String>(6)?))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (guid, entity_guid, event_type, data, timestamp, user_id, sync_level) = row?;
            events.push(Self::row_to_event(guid, entity_guid, event_type, data, timestamp, user_id, sync_level)?);
        }
        Ok(events)
    }

    fn get_events_since_pagination(&self, ts: EventTimestamp, limit: usize) -> StorageResult<(Vec<Event>, Option<EventTimestamp>)> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guid, entity_guid, type, data, timestamp, user_id, sync_level FROM events
             WHERE tenant_id = ?1 AND timestamp > ?2 ORDER BY timestamp ASC, guid ASC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![self.tenant_id.as_str(), ts.to_rfc3339(), limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?, row.get::<_, String>(4)?, row.get::<_, String>(5)?, row.get::<_, String>(6)?))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (guid, entity_guid, event_type, data, timestamp, user_id, sync_level) = row?;
            events.push(Self::row_to_event(guid, entity_guid, event_type, data, timestamp, user_id, sync_level)?);
        }
        let next_cursor = events.last().map(|e| e.timestamp);
        Ok((events, next_cursor))
    }

    fn update_event_sync_level(&self, guid: EventGuid, level: SyncLevel) -> StorageResult<()> {
        self.update_sync_level_from_events(&[guid], level)
    }

    fn update_sync_level_from_events(&self, guids: &[EventGuid], level: SyncLevel) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for guid in guids {
            let current: String = conn.query_row(
                "SELECT sync_level FROM events WHERE guid = ?1 AND tenant_id = ?2",
                params![guid.to_string(), self.tenant_id.as_str()],
                |row| row.get(0),
            )?;
            let advanced = parse_sync_level(&current).max(level);
            conn.execute(
                "UPDATE events SET sync_level = ?1 WHERE guid = ?2 AND tenant_id = ?3",
                params![sync_level_str(advanced), guid.to_string(), self.tenant_id.as_str()],
            )?;
        }
        Ok(())
    }

    fn save_audit_log(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        self.save_audit_logs(std::slice::from_ref(entry))
    }

    fn save_audit_logs(&self, entries: &[AuditLogEntry]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for entry in entries {
            conn.execute(
                "INSERT INTO audit (guid, timestamp, user_id, action, event_guid, entity_guid, changes, signature, sync_level, tenant_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (guid, tenant_id) DO NOTHING",
                params![
                    entry.guid.to_string(),
                    entry.timestamp.to_rfc3339(),
                    entry.user_id.to_string(),
                    entry.action.as_str(),
                    entry.event_guid.to_string(),
                    entry.entity_guid.to_string(),
                    entry.changes.to_string(),
                    entry.signature,
                    sync_level_str(entry.sync_level),
                    self.tenant_id.as_str(),
                ],
            )?;
        }
        Ok(())
    }

    fn get_audit_logs_since(&self, ts: EventTimestamp) -> StorageResult<Vec<AuditLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guid, timestamp, user_id, action, event_guid, entity_guid, changes, signature, sync_level FROM audit
             WHERE tenant_id = ?1 AND timestamp > ?2 ORDER BY timestamp ASC, guid ASC",
        )?;
        let rows = stmt.query_map(params![self.tenant_id.as_str(), ts.to_rfc3339()], audit_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    fn get_audit_trail_by_entity_guid(&self, guid: datacollect_types::EntityGuid) -> StorageResult<Vec<AuditLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guid, timestamp, user_id, action, event_guid, entity_guid, changes, signature, sync_level FROM audit
             WHERE tenant_id = ?1 AND entity_guid = ?2 ORDER BY timestamp ASC, guid ASC",
        )?;
        let rows = stmt.query_map(params![self.tenant_id.as_str(), guid.to_string()], audit_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    fn get_merkle_nodes(&self) -> StorageResult<Vec<(i64, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT idx, hash FROM merkle_nodes WHERE tenant_id = ?1 ORDER BY idx ASC")?;
        let rows = stmt.query_map(params![self.tenant_id.as_str()], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn save_merkle_nodes(&self, nodes: &[(i64, String)]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM merkle_nodes WHERE tenant_id = ?1", params![self.tenant_id.as_str()])?;
        for (idx, hash) in nodes {
            conn.execute(
                "INSERT INTO merkle_nodes (idx, hash, tenant_id) VALUES (?1, ?2, ?3)",
                params![idx, hash, self.tenant_id.as_str()],
            )?;
        }
        Ok(())
    }

    fn get_cursor(&self, name: &str) -> StorageResult<Option<EventTimestamp>> {
        let conn = self.conn.lock().unwrap();
        let ts: Option<String> = conn
            .query_row(
                "SELECT timestamp FROM sync_cursors WHERE name = ?1 AND tenant_id = ?2",
                params![name, self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .ok();
        ts.map(|s| EventTimestamp::parse(&s).map_err(|e| StorageError::InvalidData(format!("bad cursor: {e}")))).transpose()
    }

    fn set_cursor(&self, name: &str, ts: EventTimestamp) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_cursors (name, timestamp, tenant_id) VALUES (?1, ?2, ?3)
             ON CONFLICT (name, tenant_id) DO UPDATE SET timestamp = excluded.timestamp",
            params![name, ts.to_rfc3339(), self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM events; DELETE FROM audit; DELETE FROM merkle_nodes; DELETE FROM sync_cursors;",
        )?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[allow(clippy::type_complexity)]
fn audit_row(row: &duckdb::Row<'_>) -> duckdb::Result<StorageResult<AuditLogEntry>> {
    let guid: String = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let action: String = row.get(3)?;
    let event_guid: String = row.get(4)?;
    let entity_guid: String = row.get(5)?;
    let changes: String = row.get(6)?;
    let signature: String = row.get(7)?;
    let sync_level: String = row.get(8)?;

    Ok((|| -> StorageResult<AuditLogEntry> {
        Ok(AuditLogEntry {
            guid: guid.parse().map_err(|e| StorageError::InvalidData(format!("bad audit guid: {e}")))?,
            timestamp: EventTimestamp::parse(&timestamp).map_err(|e| StorageError::InvalidData(format!("bad timestamp: {e}")))?,
            user_id: user_id.parse().map_err(|e| StorageError::InvalidData(format!("bad user id: {e}")))?,
            action: action.into(),
            event_guid: event_guid.parse().map_err(|e| StorageError::InvalidData(format!("bad event guid: {e}")))?,
            entity_guid: entity_guid.parse().map_err(|e| StorageError::InvalidData(format!("bad entity guid: {e}")))?,
            changes: serde_json::from_str(&changes)?,
            signature,
            sync_level: parse_sync_level(&sync_level),
        })
    })())
}

/// Cursor names under which [`EventStore`] persists the sync progress
/// markers defined in the data model's `SyncCursors`.
pub mod cursor_names {
    pub const LAST_LOCAL_SYNC: &str = "lastLocalSync";
    pub const LAST_REMOTE_SYNC: &str = "lastRemoteSync";
    pub const LAST_PUSH_EXTERNAL_SYNC: &str = "lastPushExternalSync";
    pub const LAST_PULL_EXTERNAL_SYNC: &str = "lastPullExternalSync";
}

/// The Event Store: owns the event log and the Merkle tree over it
/// (§3's ownership rule), atop a pluggable [`EventStorageAdapter`].
///
/// A single mutex guards the adapter and the in-memory Merkle log
/// together, realizing "a mutex protects `saveEvent`, Merkle rebuild,
/// and audit append, so the root is always consistent with the event
/// list" (§5).
pub struct EventStore {
    inner: Mutex<EventStoreInner>,
}

struct EventStoreInner {
    adapter: Box<dyn EventStorageAdapter>,
    merkle: MerkleLog,
}

impl EventStore {
    /// Builds an `EventStore` over `adapter`, rebuilding the Merkle log
    /// from the adapter's current event list — "the tree is rebuilt from
    /// the event list on `init`" (§4.2).
    pub fn new(adapter: Box<dyn EventStorageAdapter>) -> StorageResult<Self> {
        let events = adapter.get_all_events()?;
        let merkle = MerkleLog::rebuild(events.iter().map(|e| e.guid));
        Ok(Self { inner: Mutex::new(EventStoreInner { adapter, merkle }) })
    }

    /// Opens an in-memory DuckDB-backed store (tests, ephemeral sessions).
    pub fn open_in_memory(tenant_id: TenantId) -> StorageResult<Self> {
        Self::new(Box::new(DuckDbEventStore::open_in_memory(tenant_id)?))
    }

    /// Persists `event`. A guid already in the log is a no-op (idempotence
    /// across retried pulls) — the event, its Merkle leaf, and its audit
    /// entry are only ever written once.
    pub fn save_event(&self, event: &Event) -> StorageResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.adapter.event_exists(event.guid)? {
            return inner.adapter.save_event(event);
        }
        let id = inner.adapter.save_event(event)?;
        inner.merkle.append(event.guid);
        let entry = AuditLogEntry::new(
            event.user_id,
            event.event_type.clone(),
            event.guid,
            event.entity_guid,
            event.data.clone(),
            event.timestamp,
            event.sync_level,
        );
        inner.adapter.save_audit_log(&entry)?;
        Ok(id)
    }

    pub fn event_exists(&self, guid: EventGuid) -> StorageResult<bool> {
        self.inner.lock().unwrap().adapter.event_exists(guid)
    }

    pub fn get_all_events(&self) -> StorageResult<Vec<Event>> {
        self.inner.lock().unwrap().adapter.get_all_events()
    }

    pub fn get_events_since(&self, ts: EventTimestamp) -> StorageResult<Vec<Event>> {
        self.inner.lock().unwrap().adapter.get_events_since(ts)
    }

    /// Returns events with `timestamp > ts`, capped at `limit`, plus the
    /// cursor to resume from (the last returned event's timestamp, or
    /// `None` once the tail is reached).
    pub fn get_events_since_pagination(&self, ts: EventTimestamp, limit: usize) -> StorageResult<(Vec<Event>, Option<EventTimestamp>)> {
        self.inner.lock().unwrap().adapter.get_events_since_pagination(ts, limit)
    }

    /// Advances each listed event's sync level to `max(current, level)` —
    /// never regresses.
    pub fn update_sync_level_from_events(&self, guids: &[EventGuid], level: SyncLevel) -> StorageResult<()> {
        self.inner.lock().unwrap().adapter.update_sync_level_from_events(guids, level)
    }

    pub fn get_audit_logs_since(&self, ts: EventTimestamp) -> StorageResult<Vec<AuditLogEntry>> {
        self.inner.lock().unwrap().adapter.get_audit_logs_since(ts)
    }

    pub fn save_audit_logs(&self, entries: &[AuditLogEntry]) -> StorageResult<()> {
        self.inner.lock().unwrap().adapter.save_audit_logs(entries)
    }

    pub fn get_audit_trail_by_entity_guid(&self, guid: EntityGuid) -> StorageResult<Vec<AuditLogEntry>> {
        self.inner.lock().unwrap().adapter.get_audit_trail_by_entity_guid(guid)
    }

    pub fn get_cursor(&self, name: &str) -> StorageResult<Option<EventTimestamp>> {
        self.inner.lock().unwrap().adapter.get_cursor(name)
    }

    pub fn set_cursor(&self, name: &str, ts: EventTimestamp) -> StorageResult<()> {
        self.inner.lock().unwrap().adapter.set_cursor(name, ts)
    }

    /// The current Merkle root, hex-encoded, or `""` when the log is empty.
    pub fn merkle_root(&self) -> String {
        self.inner.lock().unwrap().merkle.root()
    }

    /// The sibling-hash membership proof for `guid`, or `None` if it has
    /// never been appended.
    pub fn merkle_proof(&self, guid: EventGuid) -> Option<Vec<Hash>> {
        self.inner.lock().unwrap().merkle.proof(&guid)
    }

    /// Replays `proof` from `guid`'s leaf and compares the result to
    /// `expected_root`. `false` signals tampering: either `guid` was
    /// altered (and so no longer resolves to a leaf) or an intermediate
    /// hash was forged.
    pub fn verify_event(&self, guid: EventGuid, proof: &[Hash], expected_root: &str) -> bool {
        self.inner.lock().unwrap().merkle.verify(&guid, proof, expected_root)
    }

    pub fn clear(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.adapter.clear()?;
        inner.merkle = MerkleLog::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_types::{EntityGuid, KnownEventType, UserId};

    fn make_event(entity_guid: EntityGuid, ts: EventTimestamp) -> Event {
        Event::new(entity_guid, UserId::new(), KnownEventType::CreateIndividual, serde_json::json!({"name": "John"}), ts)
    }

    #[test]
    fn save_and_retrieve() {
        let store = DuckDbEventStore::open_in_memory(TenantId::default()).unwrap();
        let event = make_event(EntityGuid::new(), EventTimestamp::now());
        store.save_event(&event).unwrap();
        assert!(store.event_exists(event.guid).unwrap());
        let all = store.get_all_events().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].guid, event.guid);
    }

    #[test]
    fn duplicate_save_is_idempotent() {
        let store = DuckDbEventStore::open_in_memory(TenantId::default()).unwrap();
        let event = make_event(EntityGuid::new(), EventTimestamp::now());
        store.save_event(&event).unwrap();
        store.save_event(&event).unwrap();
        assert_eq!(store.get_all_events().unwrap().len(), 1);
    }

    #[test]
    fn pagination_cursor_advances_to_last_returned_timestamp() {
        let store = DuckDbEventStore::open_in_memory(TenantId::default()).unwrap();
        let base = EventTimestamp::now();
        let mut ts = base;
        for _ in 0..5 {
            ts = ts.next_millis();
            store.save_event(&make_event(EntityGuid::new(), ts)).unwrap();
        }
        let (page, cursor) = store.get_events_since_pagination(base, 3).unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(cursor, Some(page.last().unwrap().timestamp));
    }

    #[test]
    fn sync_level_never_regresses() {
        let store = DuckDbEventStore::open_in_memory(TenantId::default()).unwrap();
        let event = make_event(EntityGuid::new(), EventTimestamp::now());
        store.save_event(&event).unwrap();
        store.update_event_sync_level(event.guid, SyncLevel::External).unwrap();
        store.update_event_sync_level(event.guid, SyncLevel::Remote).unwrap();
        let all = store.get_all_events().unwrap();
        assert_eq!(all[0].sync_level, SyncLevel::External);
    }

    #[test]
    fn cursor_round_trips() {
        let store = DuckDbEventStore::open_in_memory(TenantId::default()).unwrap();
        assert!(store.get_cursor("lastRemoteSync").unwrap().is_none());
        let ts = EventTimestamp::now();
        store.set_cursor("lastRemoteSync", ts).unwrap();
        assert_eq!(store.get_cursor("lastRemoteSync").unwrap(), Some(ts));
    }
}
