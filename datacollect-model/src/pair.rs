use serde::{Deserialize, Serialize};

use crate::Entity;

/// The stored shape of an entity: the state as of last sync/load
/// (`initial`) alongside the current local state (`modified`).
///
/// Any field where `initial != modified` indicates a local-only change
/// not yet pushed upstream. `mark_synced` collapses the pair back to a
/// clean (no-drift) state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPair {
    pub initial: Entity,
    pub modified: Entity,
}

impl EntityPair {
    /// Wraps a freshly created entity: `initial` and `modified` start equal.
    #[must_use]
    pub fn fresh(entity: Entity) -> Self {
        Self {
            initial: entity.clone(),
            modified: entity,
        }
    }

    /// True if `modified` has diverged from `initial` — local-only changes
    /// exist that have not yet synced.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.initial != self.modified
    }

    /// Collapses drift: `initial` becomes a copy of `modified`.
    pub fn mark_synced(&mut self) {
        self.initial = self.modified.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacollect_types::{EntityGuid, EventTimestamp};

    #[test]
    fn fresh_pair_has_no_drift() {
        let e = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({}), EventTimestamp::now());
        let pair = EntityPair::fresh(e);
        assert!(!pair.has_drift());
    }

    #[test]
    fn modifying_introduces_drift_until_synced() {
        let e = Entity::new_individual(EntityGuid::new(), "John", serde_json::json!({"age": 30}), EventTimestamp::now());
        let mut pair = EntityPair::fresh(e);
        pair.modified.apply_update(&serde_json::json!({"age": 31}), EventTimestamp::now());
        assert!(pair.has_drift());
        pair.mark_synced();
        assert!(!pair.has_drift());
        assert_eq!(pair.initial, pair.modified);
    }
}
