use std::collections::HashMap;

use datacollect_types::{Event, EventType, KnownEventType};

use crate::appliers::{
    AddMemberApplier, CreateGroupApplier, CreateIndividualApplier, DeleteEntityApplier, Outcome, RemoveMemberApplier, ResolveDuplicateApplier, UpdateGroupApplier, UpdateIndividualApplier,
};
use crate::context::ApplierContext;
use crate::error::{ApplierError, ApplierResult};

/// A pure(-ish) reducer from `(existing entity, event)` to the next
/// entity state, dispatched on `event.type`.
pub trait EventApplier: Send + Sync {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome>;
}

/// The `type → applier` table. Deployments extend it with `register`
/// for their own `EventType::Custom` kinds; the eight built-ins are
/// always present via [`ApplierRegistry::with_builtin_appliers`].
#[derive(Default)]
pub struct ApplierRegistry {
    appliers: HashMap<EventType, Box<dyn EventApplier>>,
}

impl ApplierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_builtin_appliers() -> Self {
        let mut registry = Self::new();
        registry.register(KnownEventType::CreateIndividual.into(), Box::new(CreateIndividualApplier));
        registry.register(KnownEventType::CreateGroup.into(), Box::new(CreateGroupApplier));
        registry.register(KnownEventType::UpdateIndividual.into(), Box::new(UpdateIndividualApplier));
        registry.register(KnownEventType::UpdateGroup.into(), Box::new(UpdateGroupApplier));
        registry.register(KnownEventType::AddMember.into(), Box::new(AddMemberApplier));
        registry.register(KnownEventType::RemoveMember.into(), Box::new(RemoveMemberApplier));
        registry.register(KnownEventType::DeleteEntity.into(), Box::new(DeleteEntityApplier));
        registry.register(KnownEventType::ResolveDuplicate.into(), Box::new(ResolveDuplicateApplier));
        registry
    }

    pub fn register(&mut self, event_type: EventType, applier: Box<dyn EventApplier>) {
        self.appliers.insert(event_type, applier);
    }

    /// Validates `event`'s payload shape, looks up the registered
    /// applier for its type, and runs it. `UnknownEventType` if no
    /// applier is registered for `event.event_type`.
    pub fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        if !event.has_well_formed_payload() {
            return Err(ApplierError::ValidationError(format!("event {} has a malformed payload", event.guid)));
        }
        let applier = self.appliers.get(&event.event_type).ok_or_else(|| ApplierError::UnknownEventType(event.event_type.clone()))?;
        applier.apply(ctx, event)
    }
}
