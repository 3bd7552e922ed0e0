//! The `EntityStorageAdapter` contract, and a DuckDB-backed reference
//! implementation covering the embedded local case. A remote
//! relational/JSON-document implementation is left to the trait only —
//! concrete remote backends are outside this engine's scope.

use std::sync::{Arc, Mutex};

use datacollect_model::{Entity, EntityPair, PotentialDuplicatePair};
use datacollect_types::{EntityGuid, EventTimestamp, TenantId};
use duckdb::{params, Connection};

use crate::error::{StorageError, StorageResult};
use crate::search::SearchQuery;

/// Persists the current-state entity projection, the potential-duplicate
/// table, and the external-id index.
///
/// All writes for one tenant are expected to be serialized per entity
/// `guid` by the caller (the Entity Store proper, one layer up).
pub trait EntityStorageAdapter: Send + Sync {
    fn init(&self) -> StorageResult<()>;
    fn save_entity(&self, pair: &EntityPair) -> StorageResult<()>;
    fn get_entity(&self, guid: EntityGuid) -> StorageResult<Option<EntityPair>>;
    fn get_all_entities(&self) -> StorageResult<Vec<EntityPair>>;
    fn get_modified_entities_since(&self, ts: EventTimestamp) -> StorageResult<Vec<EntityPair>>;
    fn delete_entity(&self, guid: EntityGuid) -> StorageResult<()>;
    fn mark_entity_as_synced(&self, guid: EntityGuid) -> StorageResult<()>;
    fn get_entity_by_external_id(&self, external_id: &str) -> StorageResult<Option<EntityPair>>;
    fn set_external_id(&self, guid: EntityGuid, external_id: &str) -> StorageResult<()>;
    fn search_entities(&self, query: &SearchQuery) -> StorageResult<Vec<EntityPair>>;
    fn get_potential_duplicates(&self) -> StorageResult<Vec<PotentialDuplicatePair>>;
    fn save_potential_duplicates(&self, pairs: &[PotentialDuplicatePair]) -> StorageResult<()>;
    fn resolve_potential_duplicates(&self, pairs: &[PotentialDuplicatePair]) -> StorageResult<()>;
    fn clear(&self) -> StorageResult<()>;
    fn close(&self) -> StorageResult<()>;
}

/// DuckDB-backed reference implementation of [`EntityStorageAdapter`].
///
/// `initial`/`modified` are stored as serialized JSON columns; the whole
/// `Entity` enum (tag included) round-trips through `serde_json`, so a
/// Group's `memberIds` travel with it rather than living in a join table.
pub struct DuckDbEntityStore {
    conn: Arc<Mutex<Connection>>,
    tenant_id: TenantId,
}

impl DuckDbEntityStore {
    pub fn open(path: &std::path::Path, tenant_id: TenantId) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), tenant_id };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory(tenant_id: TenantId) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), tenant_id };
        store.init()?;
        Ok(store)
    }

    fn row_to_pair(initial: String, modified: String) -> StorageResult<EntityPair> {
        Ok(EntityPair {
            initial: serde_json::from_str(&initial)?,
            modified: serde_json::from_str(&modified)?,
        })
    }
}

impl EntityStorageAdapter for DuckDbEntityStore {
    fn init(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                guid TEXT NOT NULL,
                initial TEXT NOT NULL,
                modified TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                external_id TEXT,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (guid, tenant_id)
            );
            CREATE TABLE IF NOT EXISTS potential_duplicates (
                entity_guid TEXT NOT NULL,
                duplicate_guid TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (entity_guid, duplicate_guid, tenant_id)
            );
            ",
        )?;
        Ok(())
    }

    fn save_entity(&self, pair: &EntityPair) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let guid = pair.modified.guid().to_string();
        let initial = serde_json::to_string(&pair.initial)?;
        let modified = serde_json::to_string(&pair.modified)?;
        let last_updated = pair.modified.common().last_updated.to_rfc3339();
        let external_id = pair.modified.common().external_id.clone();
        conn.execute(
            "INSERT INTO entities (guid, initial, modified, last_updated, external_id, tenant_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (guid, tenant_id) DO UPDATE SET
                initial = excluded.initial,
                modified = excluded.modified,
                last_updated = excluded.last_updated,
                external_id = excluded.external_id",
            params![guid, initial, modified, last_updated, external_id, self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn get_entity(&self, guid: EntityGuid) -> StorageResult<Option<EntityPair>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT initial, modified FROM entities WHERE guid = ?1 AND tenant_id = ?2",
                params![guid.to_string(), self.tenant_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();
        row.map(|(i, m)| Self::row_to_pair(i, m)).transpose()
    }

    fn get_all_entities(&self) -> StorageResult<Vec<EntityPair>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT initial, modified FROM entities WHERE tenant_id = ?1")?;
        let rows = stmt.query_map(params![self.tenant_id.as_str()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (i, m) = row?;
            out.push(Self::row_to_pair(i, m)?);
        }
        Ok(out)
    }

    fn get_modified_entities_since(&self, ts: EventTimestamp) -> StorageResult<Vec<EntityPair>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT initial, modified FROM entities WHERE tenant_id = ?1 AND last_updated > ?2")?;
        let rows = stmt.query_map(params![self.tenant_id.as_str(), ts.to_rfc3339()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (i, m) = row?;
            out.push(Self::row_to_pair(i, m)?);
        }
        Ok(out)
    }

    fn delete_entity(&self, guid: EntityGuid) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM entities WHERE guid = ?1 AND tenant_id = ?2",
            params![guid.to_string(), self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn mark_entity_as_synced(&self, guid: EntityGuid) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE entities SET initial = modified WHERE guid = ?1 AND tenant_id = ?2",
            params![guid.to_string(), self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn get_entity_by_external_id(&self, external_id: &str) -> StorageResult<Option<EntityPair>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT initial, modified FROM entities WHERE external_id = ?1 AND tenant_id = ?2",
                params![external_id, self.tenant_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();
        row.map(|(i, m)| Self::row_to_pair(i, m)).transpose()
    }

    fn set_external_id(&self, guid: EntityGuid, external_id: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT guid FROM entities WHERE external_id = ?1 AND tenant_id = ?2",
                params![external_id, self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .ok();
        if let Some(owner) = existing {
            if owner != guid.to_string() {
                return Err(StorageError::DuplicateExternalId(external_id.to_string()));
            }
        }
        let updated = conn.execute(
            "UPDATE entities SET external_id = ?1 WHERE guid = ?2 AND tenant_id = ?3",
            params![external_id, guid.to_string(), self.tenant_id.as_str()],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("entity {guid} not found")));
        }
        // keep initial/modified payload's external_id field in sync for round-tripping.
        if let Some(mut pair) = self.get_entity(guid)? {
            pair.initial.common_mut().external_id = Some(external_id.to_string());
            pair.modified.common_mut().external_id = Some(external_id.to_string());
            drop(conn);
            self.save_entity(&pair)?;
        }
        Ok(())
    }

    fn search_entities(&self, query: &SearchQuery) -> StorageResult<Vec<EntityPair>> {
        Ok(self.get_all_entities()?.into_iter().filter(|pair| query.matches(pair)).collect())
    }

    fn get_potential_duplicates(&self) -> StorageResult<Vec<PotentialDuplicatePair>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT entity_guid, duplicate_guid FROM potential_duplicates WHERE tenant_id = ?1")?;
        let rows = stmt.query_map(params![self.tenant_id.as_str()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (a, b) = row?;
            out.push(PotentialDuplicatePair {
                entity_guid: a.parse().map_err(|e| StorageError::InvalidData(format!("bad guid: {e}")))?,
                duplicate_guid: b.parse().map_err(|e| StorageError::InvalidData(format!("bad guid: {e}")))?,
            });
        }
        Ok(out)
    }

    fn save_potential_duplicates(&self, pairs: &[PotentialDuplicatePair]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for pair in pairs {
            conn.execute(
                "INSERT INTO potential_duplicates (entity_guid, duplicate_guid, tenant_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT (entity_guid, duplicate_guid, tenant_id) DO NOTHING",
                params![pair.entity_guid.to_string(), pair.duplicate_guid.to_string(), self.tenant_id.as_str()],
            )?;
        }
        Ok(())
    }

    fn resolve_potential_duplicates(&self, pairs: &[PotentialDuplicatePair]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for pair in pairs {
            conn.execute(
                "DELETE FROM potential_duplicates WHERE entity_guid = ?1 AND duplicate_guid = ?2 AND tenant_id = ?3",
                params![pair.entity_guid.to_string(), pair.duplicate_guid.to_string(), self.tenant_id.as_str()],
            )?;
        }
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DELETE FROM entities; DELETE FROM potential_duplicates;")?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Striped per-guid lock table, realizing "Entity Store writes are
/// serialized per entity guid; concurrent writes to distinct guids may
/// proceed in parallel" (§5) on top of an adapter with no locking
/// guarantee of its own.
#[derive(Default)]
struct LockStripes {
    stripes: Mutex<std::collections::HashMap<EntityGuid, Arc<Mutex<()>>>>,
}

impl LockStripes {
    fn stripe_for(&self, guid: EntityGuid) -> Arc<Mutex<()>> {
        let mut stripes = self.stripes.lock().unwrap();
        stripes.entry(guid).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// The Entity Store: owns the entity projection, the potential-duplicate
/// table, and the external-id index, atop a pluggable
/// [`EntityStorageAdapter`].
pub struct EntityStore {
    adapter: Box<dyn EntityStorageAdapter>,
    stripes: LockStripes,
}

impl EntityStore {
    #[must_use]
    pub fn new(adapter: Box<dyn EntityStorageAdapter>) -> Self {
        Self { adapter, stripes: LockStripes::default() }
    }

    /// Opens an in-memory DuckDB-backed store (tests, ephemeral sessions).
    pub fn open_in_memory(tenant_id: TenantId) -> StorageResult<Self> {
        Ok(Self::new(Box::new(DuckDbEntityStore::open_in_memory(tenant_id)?)))
    }

    fn with_stripe<T>(&self, guid: EntityGuid, f: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
        let stripe = self.stripes.stripe_for(guid);
        let _guard = stripe.lock().unwrap();
        f()
    }

    pub fn save_entity(&self, pair: &EntityPair) -> StorageResult<()> {
        self.with_stripe(pair.modified.guid(), || self.adapter.save_entity(pair))
    }

    pub fn get_entity(&self, guid: EntityGuid) -> StorageResult<Option<EntityPair>> {
        self.adapter.get_entity(guid)
    }

    pub fn entity_exists(&self, guid: EntityGuid) -> StorageResult<bool> {
        Ok(self.adapter.get_entity(guid)?.is_some())
    }

    pub fn get_all_entities(&self) -> StorageResult<Vec<EntityPair>> {
        self.adapter.get_all_entities()
    }

    pub fn get_modified_entities_since(&self, ts: EventTimestamp) -> StorageResult<Vec<EntityPair>> {
        self.adapter.get_modified_entities_since(ts)
    }

    pub fn delete_entity(&self, guid: EntityGuid) -> StorageResult<()> {
        self.with_stripe(guid, || self.adapter.delete_entity(guid))
    }

    pub fn mark_entity_as_synced(&self, guid: EntityGuid) -> StorageResult<()> {
        self.with_stripe(guid, || self.adapter.mark_entity_as_synced(guid))
    }

    pub fn get_entity_by_external_id(&self, external_id: &str) -> StorageResult<Option<EntityPair>> {
        self.adapter.get_entity_by_external_id(external_id)
    }

    pub fn set_external_id(&self, guid: EntityGuid, external_id: &str) -> StorageResult<()> {
        self.with_stripe(guid, || self.adapter.set_external_id(guid, external_id))
    }

    pub fn search_entities(&self, query: &SearchQuery) -> StorageResult<Vec<EntityPair>> {
        self.adapter.search_entities(query)
    }

    pub fn get_potential_duplicates(&self) -> StorageResult<Vec<PotentialDuplicatePair>> {
        self.adapter.get_potential_duplicates()
    }

    pub fn save_potential_duplicates(&self, pairs: &[PotentialDuplicatePair]) -> StorageResult<()> {
        self.adapter.save_potential_duplicates(pairs)
    }

    pub fn resolve_potential_duplicates(&self, pairs: &[PotentialDuplicatePair]) -> StorageResult<()> {
        self.adapter.resolve_potential_duplicates(pairs)
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.adapter.clear()
    }

    /// Convenience used by appliers: fetches the current entity, applies
    /// `f` to a clone of its `modified` side, and saves the pair back —
    /// the read-update-write cycle every built-in applier performs.
    pub fn update_entity(&self, guid: EntityGuid, f: impl FnOnce(&mut Entity)) -> StorageResult<Entity> {
        self.with_stripe(guid, || {
            let mut pair = self
                .adapter
                .get_entity(guid)?
                .ok_or_else(|| StorageError::NotFound(format!("entity {guid}")))?;
            f(&mut pair.modified);
            self.adapter.save_entity(&pair)?;
            Ok(pair.modified)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_types::EventTimestamp;

    fn fresh_individual() -> EntityPair {
        EntityPair::fresh(Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({"age": 30}), EventTimestamp::now()))
    }

    #[test]
    fn save_and_get_round_trips() {
        let store = EntityStore::open_in_memory(TenantId::default()).unwrap();
        let pair = fresh_individual();
        let guid = pair.modified.guid();
        store.save_entity(&pair).unwrap();
        let fetched = store.get_entity(guid).unwrap().unwrap();
        assert_eq!(fetched, pair);
    }

    #[test]
    fn mark_synced_clears_drift() {
        let store = EntityStore::open_in_memory(TenantId::default()).unwrap();
        let mut pair = fresh_individual();
        let guid = pair.modified.guid();
        pair.modified.apply_update(&serde_json::json!({"age": 31}), EventTimestamp::now());
        store.save_entity(&pair).unwrap();
        store.mark_entity_as_synced(guid).unwrap();
        let fetched = store.get_entity(guid).unwrap().unwrap();
        assert!(!fetched.has_drift());
    }

    #[test]
    fn set_external_id_rejects_reuse_across_entities() {
        let store = EntityStore::open_in_memory(TenantId::default()).unwrap();
        let a = fresh_individual();
        let b = fresh_individual();
        store.save_entity(&a).unwrap();
        store.save_entity(&b).unwrap();
        store.set_external_id(a.modified.guid(), "ext-1").unwrap();
        let err = store.set_external_id(b.modified.guid(), "ext-1").unwrap_err();
        assert!(matches!(err, StorageError::DuplicateExternalId(_)));
    }

    #[test]
    fn potential_duplicates_round_trip_and_resolve() {
        let store = EntityStore::open_in_memory(TenantId::default()).unwrap();
        let pair = PotentialDuplicatePair::canonical(EntityGuid::new(), EntityGuid::new());
        store.save_potential_duplicates(&[pair]).unwrap();
        assert_eq!(store.get_potential_duplicates().unwrap(), vec![pair]);
        store.resolve_potential_duplicates(&[pair]).unwrap();
        assert!(store.get_potential_duplicates().unwrap().is_empty());
    }

    #[test]
    fn update_entity_performs_read_modify_write() {
        let store = EntityStore::open_in_memory(TenantId::default()).unwrap();
        let pair = fresh_individual();
        let guid = pair.modified.guid();
        store.save_entity(&pair).unwrap();
        let updated = store.update_entity(guid, |e| e.apply_update(&serde_json::json!({"age": 31}), EventTimestamp::now())).unwrap();
        assert_eq!(updated.version(), 2);
    }
}
