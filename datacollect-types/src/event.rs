//! Event types — immutable form submissions that are the unit of
//! replication and the sole input to the entity projection.
//!
//! The core only understands the built-in event kinds below; deployments
//! that need additional kinds register them as `EventType::Custom(name)`
//! and supply their own applier in the applier registry. The core never
//! interprets `data` itself — it is opaque structured JSON, entirely
//! applier-defined.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{EntityGuid, EventGuid, EventTimestamp, UserId};

/// The built-in event kinds understood by the core appliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnownEventType {
    CreateIndividual,
    UpdateIndividual,
    CreateGroup,
    UpdateGroup,
    AddMember,
    RemoveMember,
    DeleteEntity,
    ResolveDuplicate,
}

impl KnownEventType {
    /// All built-in kinds, in no particular order.
    pub const ALL: [KnownEventType; 8] = [
        KnownEventType::CreateIndividual,
        KnownEventType::UpdateIndividual,
        KnownEventType::CreateGroup,
        KnownEventType::UpdateGroup,
        KnownEventType::AddMember,
        KnownEventType::RemoveMember,
        KnownEventType::DeleteEntity,
        KnownEventType::ResolveDuplicate,
    ];

    /// The wire string for this kind (e.g. `"create-individual"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownEventType::CreateIndividual => "create-individual",
            KnownEventType::UpdateIndividual => "update-individual",
            KnownEventType::CreateGroup => "create-group",
            KnownEventType::UpdateGroup => "update-group",
            KnownEventType::AddMember => "add-member",
            KnownEventType::RemoveMember => "remove-member",
            KnownEventType::DeleteEntity => "delete-entity",
            KnownEventType::ResolveDuplicate => "resolve-duplicate",
        }
    }
}

impl fmt::Display for KnownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event kind: one of the built-ins, or a deployment-registered
/// custom type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventType {
    Known(KnownEventType),
    Custom(String),
}

impl EventType {
    /// The wire string for this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Known(k) => k.as_str(),
            EventType::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<KnownEventType> for EventType {
    fn from(k: KnownEventType) -> Self {
        EventType::Known(k)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        for known in KnownEventType::ALL {
            if known.as_str() == s {
                return EventType::Known(known);
            }
        }
        EventType::Custom(s)
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventType::from(s.to_string()))
    }
}

/// Replication frontier of an event: how far it has propagated.
///
/// Ordered so that `SyncLevel::max` (used when advancing sync level
/// after a successful push/pull) never regresses a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncLevel {
    Local,
    Remote,
    External,
}

impl SyncLevel {
    /// The farther-advanced of the two levels.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

impl Default for SyncLevel {
    fn default() -> Self {
        SyncLevel::Local
    }
}

/// An immutable form submission.
///
/// Persisted verbatim once accepted: `data` and `timestamp` never
/// change afterward; only `sync_level` may advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub guid: EventGuid,
    pub entity_guid: EntityGuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub timestamp: EventTimestamp,
    pub user_id: UserId,
    #[serde(default)]
    pub sync_level: SyncLevel,
}

impl Event {
    /// Builds a new event. `sync_level` defaults to `Local`, matching
    /// the level any freshly authored event starts at before any sync
    /// phase has run.
    #[must_use]
    pub fn new(
        entity_guid: EntityGuid,
        user_id: UserId,
        event_type: impl Into<EventType>,
        data: serde_json::Value,
        timestamp: EventTimestamp,
    ) -> Self {
        Self {
            guid: EventGuid::new(),
            entity_guid,
            event_type: event_type.into(),
            data,
            timestamp,
            user_id,
            sync_level: SyncLevel::Local,
        }
    }

    /// True unless `data` is a bare scalar or array — appliers index
    /// into it by key, so anything else can never be applied.
    #[must_use]
    pub fn has_well_formed_payload(&self) -> bool {
        matches!(self.data, serde_json::Value::Object(_) | serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_roundtrips_known_kinds() {
        for known in KnownEventType::ALL {
            let wire = known.as_str().to_string();
            let parsed = EventType::from(wire.clone());
            assert_eq!(parsed, EventType::Known(known));
            assert_eq!(String::from(parsed), wire);
        }
    }

    #[test]
    fn event_type_custom_roundtrips() {
        let parsed = EventType::from("household-visit".to_string());
        assert_eq!(parsed, EventType::Custom("household-visit".to_string()));
        assert_eq!(parsed.as_str(), "household-visit");
    }

    #[test]
    fn sync_level_never_regresses_under_max() {
        assert_eq!(SyncLevel::Local.max(SyncLevel::Remote), SyncLevel::Remote);
        assert_eq!(SyncLevel::External.max(SyncLevel::Remote), SyncLevel::External);
        assert_eq!(SyncLevel::Remote.max(SyncLevel::Remote), SyncLevel::Remote);
    }

    #[test]
    fn event_rejects_non_object_payload() {
        let e = Event::new(
            EntityGuid::new(),
            UserId::new(),
            KnownEventType::CreateIndividual,
            serde_json::json!("not-an-object"),
            EventTimestamp::now(),
        );
        assert!(!e.has_well_formed_payload());
    }

    #[test]
    fn event_serializes_with_camel_case_wire_names() {
        let e = Event::new(
            EntityGuid::new(),
            UserId::new(),
            KnownEventType::CreateIndividual,
            serde_json::json!({"name": "John"}),
            EventTimestamp::now(),
        );
        let v = serde_json::to_value(&e).unwrap();
        assert!(v.get("entityGuid").is_some());
        assert!(v.get("userId").is_some());
        assert!(v.get("syncLevel").is_some());
        assert_eq!(v.get("type").unwrap(), "create-individual");
    }
}
