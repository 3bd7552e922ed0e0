use datacollect_storage::EntityStore;

use crate::duplicate::{DuplicateDetectionConfig, DuplicateDetector};

/// Everything an applier needs beyond the event itself: entity storage
/// access and the configured duplicate detector. Bundled so built-in
/// appliers don't each carry their own copy of the store/detector pair.
pub struct ApplierContext<'a> {
    pub store: &'a EntityStore,
    detector: DuplicateDetector,
}

impl<'a> ApplierContext<'a> {
    #[must_use]
    pub fn new(store: &'a EntityStore, duplicate_config: DuplicateDetectionConfig) -> Self {
        Self { store, detector: DuplicateDetector::new(duplicate_config) }
    }

    pub fn detect_duplicates(&self, candidate: &datacollect_model::Entity) -> datacollect_storage::StorageResult<()> {
        self.detector.detect(self.store, candidate)
    }
}
