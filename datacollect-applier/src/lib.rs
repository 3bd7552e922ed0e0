//! The Event Applier Service: the deterministic reducer that turns an
//! accepted [`Event`](datacollect_types::Event) into the next entity
//! projection state. Appliers are pure functions of `(existing entity,
//! event)` modulo storage reads through [`ApplierContext`]; given the
//! same event log and storage contents, replay always yields identical
//! entity state.

mod appliers;
mod context;
mod duplicate;
mod error;
mod registry;

pub use appliers::{
    AddMemberApplier, CreateGroupApplier, CreateIndividualApplier, DeleteEntityApplier, Outcome, RemoveMemberApplier, ResolveDuplicateApplier, UpdateGroupApplier, UpdateIndividualApplier,
};
pub use context::ApplierContext;
pub use duplicate::{DuplicateDetectionConfig, DuplicateDetector, FieldPath};
pub use error::{ApplierError, ApplierResult};
pub use registry::{ApplierRegistry, EventApplier};
