//! Duplicate detection: flags candidate pairs after a create-* applier
//! runs, for human review via the potential-duplicate table.

use datacollect_model::{Entity, EntityPair, PotentialDuplicatePair};
use datacollect_storage::EntityStore;

/// A dotted path into either an entity's top-level `name` field or a
/// field nested under `data` (`"data.dateOfBirth"`, `"data.phone"`, …).
pub type FieldPath = String;

/// Tunable field set and agreement threshold for duplicate detection.
///
/// Defaults to the fields and threshold observed in practice: `name`,
/// `data.name`, `data.dateOfBirth`, `data.phone`, `data.email`, with at
/// least 2 of them agreeing (case-insensitive, trimmed) to flag a pair.
#[derive(Debug, Clone)]
pub struct DuplicateDetectionConfig {
    pub fields: Vec<FieldPath>,
    pub threshold: usize,
}

impl Default for DuplicateDetectionConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                "name".to_string(),
                "data.name".to_string(),
                "data.dateOfBirth".to_string(),
                "data.phone".to_string(),
                "data.email".to_string(),
            ],
            threshold: 2,
        }
    }
}

pub struct DuplicateDetector {
    config: DuplicateDetectionConfig,
}

impl DuplicateDetector {
    #[must_use]
    pub fn new(config: DuplicateDetectionConfig) -> Self {
        Self { config }
    }

    /// Compares `candidate` against every other entity of the same
    /// `kind()` already in `store`, recording a canonical
    /// `PotentialDuplicatePair` for each one meeting the threshold.
    pub fn detect(&self, store: &EntityStore, candidate: &Entity) -> datacollect_storage::StorageResult<()> {
        let others = store.get_all_entities()?;
        let mut found = Vec::new();
        for other in &others {
            let other_entity = &other.modified;
            if other_entity.guid() == candidate.guid() || other_entity.kind() != candidate.kind() {
                continue;
            }
            if self.agreement_count(candidate, other_entity) >= self.config.threshold {
                found.push(PotentialDuplicatePair::canonical(candidate.guid(), other_entity.guid()));
            }
        }
        if !found.is_empty() {
            store.save_potential_duplicates(&found)?;
        }
        Ok(())
    }

    fn agreement_count(&self, a: &Entity, b: &Entity) -> usize {
        self.config
            .fields
            .iter()
            .filter(|field| {
                let va = field_value(a, field);
                let vb = field_value(b, field);
                match (va, vb) {
                    (Some(va), Some(vb)) => eq_case_insensitive(&va, &vb),
                    _ => false,
                }
            })
            .count()
    }
}

/// Resolves `field` (either `"name"` or `"data.<key>"`) against `entity`.
fn field_value(entity: &Entity, field: &str) -> Option<String> {
    if field == "name" {
        return Some(entity.common().name.clone());
    }
    let key = field.strip_prefix("data.")?;
    entity.common().data.get(key)?.as_str().map(str::to_string)
}

fn eq_case_insensitive(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_types::{EventTimestamp, TenantId};

    fn store() -> EntityStore {
        EntityStore::open_in_memory(TenantId::default()).unwrap()
    }

    fn individual(name: &str, phone: &str) -> Entity {
        Entity::new_individual(
            datacollect_types::EntityGuid::new(),
            name,
            serde_json::json!({"name": name, "phone": phone}),
            EventTimestamp::now(),
        )
    }

    #[test]
    fn flags_a_pair_sharing_name_and_phone() {
        let store = store();
        let a = individual("Jane Doe", "555-0100");
        let b = individual(" jane doe ", "555-0100");
        store.save_entity(&EntityPair::fresh(a.clone())).unwrap();
        store.save_entity(&EntityPair::fresh(b.clone())).unwrap();

        let detector = DuplicateDetector::new(DuplicateDetectionConfig::default());
        detector.detect(&store, &b).unwrap();

        let pairs = store.get_potential_duplicates().unwrap();
        assert_eq!(pairs, vec![PotentialDuplicatePair::canonical(a.guid(), b.guid())]);
    }

    #[test]
    fn does_not_flag_a_pair_sharing_only_one_field() {
        let store = store();
        let a = individual("Jane Doe", "555-0100");
        let b = individual("Jane Doe", "555-9999");
        store.save_entity(&EntityPair::fresh(a.clone())).unwrap();
        store.save_entity(&EntityPair::fresh(b.clone())).unwrap();

        let detector = DuplicateDetector::new(DuplicateDetectionConfig { threshold: 2, ..DuplicateDetectionConfig::default() });
        detector.detect(&store, &b).unwrap();

        assert!(store.get_potential_duplicates().unwrap().is_empty());
    }

    #[test]
    fn does_not_compare_entities_of_different_kinds() {
        let store = store();
        let a = individual("Jane Doe", "555-0100");
        let group = Entity::new_group(datacollect_types::EntityGuid::new(), "Jane Doe", serde_json::json!({"name": "Jane Doe", "phone": "555-0100"}), EventTimestamp::now());
        store.save_entity(&EntityPair::fresh(a.clone())).unwrap();
        store.save_entity(&EntityPair::fresh(group.clone())).unwrap();

        let detector = DuplicateDetector::new(DuplicateDetectionConfig::default());
        detector.detect(&store, &group).unwrap();

        assert!(store.get_potential_duplicates().unwrap().is_empty());
    }
}
