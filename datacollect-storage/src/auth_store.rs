//! The `AuthStorageAdapter` contract, and a SQLite-backed reference
//! implementation. Grounded on the teacher's `policy_store.rs` use of
//! `rusqlite` for small key-value-shaped local state.

use std::sync::Mutex;

use datacollect_types::TenantId;
use rusqlite::{params, Connection};

use crate::error::StorageResult;

/// Persists bearer tokens (keyed by provider) and the last-logged-in
/// username, shared between the Auth Manager and the Internal Sync
/// Coordinator.
pub trait AuthStorageAdapter: Send + Sync {
    fn init(&self) -> StorageResult<()>;
    /// The default provider's token, if any provider is configured and
    /// has one stored — returns the first token found.
    fn get_token(&self) -> StorageResult<Option<String>>;
    fn get_token_by_provider(&self, provider: &str) -> StorageResult<Option<String>>;
    fn set_token(&self, provider: &str, token: &str) -> StorageResult<()>;
    fn remove_token(&self, provider: &str) -> StorageResult<()>;
    fn remove_all_tokens(&self) -> StorageResult<()>;
    fn get_username(&self) -> StorageResult<Option<String>>;
    fn set_username(&self, username: &str) -> StorageResult<()>;
    fn clear(&self) -> StorageResult<()>;
    fn close(&self) -> StorageResult<()>;
}

/// SQLite-backed reference implementation of [`AuthStorageAdapter`].
pub struct SqliteAuthStore {
    conn: Mutex<Connection>,
    tenant_id: TenantId,
}

impl SqliteAuthStore {
    pub fn open(path: &std::path::Path, tenant_id: TenantId) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn), tenant_id };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory(tenant_id: TenantId) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn), tenant_id };
        store.init()?;
        Ok(store)
    }
}

impl AuthStorageAdapter for SqliteAuthStore {
    fn init(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS auth_tokens (
                provider TEXT NOT NULL,
                token TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (provider, tenant_id)
            );
            CREATE TABLE IF NOT EXISTS auth_meta (
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                PRIMARY KEY (key, tenant_id)
            );
            ",
        )?;
        Ok(())
    }

    fn get_token(&self) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT token FROM auth_tokens WHERE tenant_id = ?1 ORDER BY provider ASC LIMIT 1",
                params![self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .ok())
    }

    fn get_token_by_provider(&self, provider: &str) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT token FROM auth_tokens WHERE provider = ?1 AND tenant_id = ?2",
                params![provider, self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .ok())
    }

    fn set_token(&self, provider: &str, token: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_tokens (provider, token, tenant_id) VALUES (?1, ?2, ?3)
             ON CONFLICT (provider, tenant_id) DO UPDATE SET token = excluded.token",
            params![provider, token, self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn remove_token(&self, provider: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM auth_tokens WHERE provider = ?1 AND tenant_id = ?2",
            params![provider, self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn remove_all_tokens(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth_tokens WHERE tenant_id = ?1", params![self.tenant_id.as_str()])?;
        Ok(())
    }

    fn get_username(&self) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT value FROM auth_meta WHERE key = 'username' AND tenant_id = ?1",
                params![self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .ok())
    }

    fn set_username(&self, username: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_meta (key, value, tenant_id) VALUES ('username', ?1, ?2)
             ON CONFLICT (key, tenant_id) DO UPDATE SET value = excluded.value",
            params![username, self.tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DELETE FROM auth_tokens; DELETE FROM auth_meta;")?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_by_provider() {
        let store = SqliteAuthStore::open_in_memory(TenantId::default()).unwrap();
        assert!(store.get_token_by_provider("basic").unwrap().is_none());
        store.set_token("basic", "abc123").unwrap();
        assert_eq!(store.get_token_by_provider("basic").unwrap(), Some("abc123".to_string()));
    }

    #[test]
    fn remove_token_clears_it() {
        let store = SqliteAuthStore::open_in_memory(TenantId::default()).unwrap();
        store.set_token("basic", "abc123").unwrap();
        store.remove_token("basic").unwrap();
        assert!(store.get_token_by_provider("basic").unwrap().is_none());
    }

    #[test]
    fn username_round_trips() {
        let store = SqliteAuthStore::open_in_memory(TenantId::default()).unwrap();
        store.set_username("jdoe").unwrap();
        assert_eq!(store.get_username().unwrap(), Some("jdoe".to_string()));
    }
}
