use serde::{Deserialize, Serialize};

use datacollect_types::{EntityGuid, EventTimestamp};

/// Fields shared by every entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCommon {
    /// Storage-assigned row id; stable within one tenant's adapter.
    pub id: i64,
    pub guid: EntityGuid,
    pub name: String,
    /// Monotonically increasing; bumped by every accepted mutating event.
    pub version: u64,
    pub last_updated: EventTimestamp,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl EntityCommon {
    fn new(guid: EntityGuid, name: impl Into<String>, data: serde_json::Value, timestamp: EventTimestamp) -> Self {
        Self {
            id: 0,
            guid,
            name: name.into(),
            version: 1,
            last_updated: timestamp,
            data,
            external_id: None,
        }
    }
}

/// A stored record: either a standalone person or a household/group that
/// links to other entities by guid.
///
/// `event.type` determines which variant a create event produces; once
/// created an entity never changes kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum Entity {
    Individual(EntityCommon),
    Group {
        #[serde(flatten)]
        common: EntityCommon,
        /// Ordered, duplicate-free sequence of member entity guids.
        member_ids: Vec<EntityGuid>,
    },
}

impl Entity {
    /// Builds a freshly created Individual at version 1.
    #[must_use]
    pub fn new_individual(guid: EntityGuid, name: impl Into<String>, data: serde_json::Value, timestamp: EventTimestamp) -> Self {
        Entity::Individual(EntityCommon::new(guid, name, data, timestamp))
    }

    /// Builds a freshly created Group at version 1, with no members.
    #[must_use]
    pub fn new_group(guid: EntityGuid, name: impl Into<String>, data: serde_json::Value, timestamp: EventTimestamp) -> Self {
        Entity::Group {
            common: EntityCommon::new(guid, name, data, timestamp),
            member_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn common(&self) -> &EntityCommon {
        match self {
            Entity::Individual(c) => c,
            Entity::Group { common, .. } => common,
        }
    }

    #[must_use]
    pub fn common_mut(&mut self) -> &mut EntityCommon {
        match self {
            Entity::Individual(c) => c,
            Entity::Group { common, .. } => common,
        }
    }

    #[must_use]
    pub fn guid(&self) -> EntityGuid {
        self.common().guid
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.common().version
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Entity::Group { .. })
    }

    /// The kind name, as used for duplicate-detection comparisons.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Individual(_) => "Individual",
            Entity::Group { .. } => "Group",
        }
    }

    #[must_use]
    pub fn member_ids(&self) -> &[EntityGuid] {
        match self {
            Entity::Individual(_) => &[],
            Entity::Group { member_ids, .. } => member_ids,
        }
    }

    /// Shallow-merges `patch` into `data`, bumps `version`, and advances
    /// `last_updated`. Used by update-individual / update-group.
    pub fn apply_update(&mut self, patch: &serde_json::Value, timestamp: EventTimestamp) {
        let common = self.common_mut();
        merge_object_shallow(&mut common.data, patch);
        common.version += 1;
        common.last_updated = timestamp;
    }

    /// Appends `member` to a Group's `member_ids` if not already present,
    /// preserving insertion order. No-op on an Individual or on a
    /// duplicate member.
    pub fn add_member(&mut self, member: EntityGuid) {
        if let Entity::Group { member_ids, .. } = self {
            if !member_ids.contains(&member) {
                member_ids.push(member);
            }
        }
    }

    /// Removes `member` from a Group's `member_ids`. Returns true if a
    /// member was actually removed.
    pub fn remove_member(&mut self, member: EntityGuid) -> bool {
        if let Entity::Group { member_ids, .. } = self {
            let before = member_ids.len();
            member_ids.retain(|m| *m != member);
            member_ids.len() != before
        } else {
            false
        }
    }
}

/// Shallow merge: top-level keys in `patch` overwrite or add to `base`.
/// Nested objects are replaced wholesale, not recursively merged — this
/// matches "shallow-merges `event.data`" in the update applier contract.
fn merge_object_shallow(base: &mut serde_json::Value, patch: &serde_json::Value) {
    let Some(patch_map) = patch.as_object() else { return };
    if !base.is_object() {
        *base = serde_json::Value::Object(Default::default());
    }
    let base_map = base.as_object_mut().expect("just ensured object");
    for (k, v) in patch_map {
        base_map.insert(k.clone(), v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_individual_starts_at_version_one() {
        let e = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({"age": 30}), EventTimestamp::now());
        assert_eq!(e.version(), 1);
        assert!(!e.is_group());
    }

    #[test]
    fn apply_update_shallow_merges_and_bumps_version() {
        let mut e = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({"name": "John", "age": 30}), EventTimestamp::now());
        e.apply_update(&serde_json::json!({"age": 31}), EventTimestamp::now());
        assert_eq!(e.version(), 2);
        assert_eq!(e.common().data, serde_json::json!({"name": "John", "age": 31}));
    }

    #[test]
    fn add_member_ignores_duplicates_and_preserves_order() {
        let mut g = Entity::new_group(EntityGuid::new(), "Household", serde_json::json!({}), EventTimestamp::now());
        let i1 = EntityGuid::new();
        let i2 = EntityGuid::new();
        g.add_member(i1);
        g.add_member(i2);
        g.add_member(i1); // duplicate
        assert_eq!(g.member_ids(), &[i1, i2]);
    }

    #[test]
    fn add_member_on_individual_is_noop() {
        let mut i = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({}), EventTimestamp::now());
        i.add_member(EntityGuid::new());
        assert!(i.member_ids().is_empty());
    }

    #[test]
    fn remove_member_reports_whether_it_removed_anything() {
        let mut g = Entity::new_group(EntityGuid::new(), "Household", serde_json::json!({}), EventTimestamp::now());
        let i1 = EntityGuid::new();
        g.add_member(i1);
        assert!(g.remove_member(i1));
        assert!(!g.remove_member(i1));
    }
}
