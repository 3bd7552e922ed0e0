use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use datacollect_types::{EntityGuid, EventGuid, EventTimestamp, EventType, SyncLevel, UserId};

/// Identifies a single audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditGuid(Uuid);

impl AuditGuid {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AuditGuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuditGuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One entry in the append-only audit trail, written once per applied
/// event. `signature` is a tamper-evidence hash over the entry's own
/// fields — distinct from, and in addition to, the event-log Merkle
/// tree, which proves membership of the event itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub guid: AuditGuid,
    pub timestamp: EventTimestamp,
    pub user_id: UserId,
    pub action: EventType,
    pub event_guid: EventGuid,
    pub entity_guid: EntityGuid,
    /// JSON-serialized description of what changed (applier-defined shape).
    pub changes: serde_json::Value,
    /// Hex-encoded SHA-256 over the entry's other fields.
    pub signature: String,
    pub sync_level: SyncLevel,
}

impl AuditLogEntry {
    /// Builds a new entry and computes its signature.
    #[must_use]
    pub fn new(
        user_id: UserId,
        action: EventType,
        event_guid: EventGuid,
        entity_guid: EntityGuid,
        changes: serde_json::Value,
        timestamp: EventTimestamp,
        sync_level: SyncLevel,
    ) -> Self {
        let guid = AuditGuid::new();
        let signature = compute_signature(&guid, &timestamp, &user_id, &action, &event_guid, &entity_guid, &changes);
        Self {
            guid,
            timestamp,
            user_id,
            action,
            event_guid,
            entity_guid,
            changes,
            signature,
            sync_level,
        }
    }

    /// Recomputes the signature from the entry's current fields and
    /// compares it to the stored one. A mismatch means the entry (or
    /// the changes payload) was altered after being written.
    #[must_use]
    pub fn verify_signature(&self) -> bool {
        compute_signature(
            &self.guid,
            &self.timestamp,
            &self.user_id,
            &self.action,
            &self.event_guid,
            &self.entity_guid,
            &self.changes,
        ) == self.signature
    }
}

fn compute_signature(
    guid: &AuditGuid,
    timestamp: &EventTimestamp,
    user_id: &UserId,
    action: &EventType,
    event_guid: &EventGuid,
    entity_guid: &EntityGuid,
    changes: &serde_json::Value,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(guid.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(b"|");
    hasher.update(user_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(action.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(event_guid.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(entity_guid.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(changes.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_types::KnownEventType;

    #[test]
    fn new_entry_verifies_its_own_signature() {
        let entry = AuditLogEntry::new(
            UserId::new(),
            KnownEventType::CreateIndividual.into(),
            EventGuid::new(),
            EntityGuid::new(),
            serde_json::json!({"name": "John"}),
            EventTimestamp::now(),
            SyncLevel::Local,
        );
        assert!(entry.verify_signature());
    }

    #[test]
    fn tampering_with_changes_breaks_the_signature() {
        let mut entry = AuditLogEntry::new(
            UserId::new(),
            KnownEventType::UpdateIndividual.into(),
            EventGuid::new(),
            EntityGuid::new(),
            serde_json::json!({"age": 30}),
            EventTimestamp::now(),
            SyncLevel::Local,
        );
        assert!(entry.verify_signature());
        entry.changes = serde_json::json!({"age": 99});
        assert!(!entry.verify_signature());
    }

    #[test]
    fn audit_guid_roundtrips_display_and_parse() {
        let guid = AuditGuid::new();
        let parsed: AuditGuid = guid.to_string().parse().unwrap();
        assert_eq!(guid, parsed);
    }
}
