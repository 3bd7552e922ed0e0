//! Built-in appliers for the eight known event kinds. Each is a small
//! pure-ish struct (modulo `ApplierContext` storage calls) registered
//! under its `KnownEventType` in the default registry.

use datacollect_model::{Entity, EntityPair, PotentialDuplicatePair};
use datacollect_types::{EntityGuid, Event};
use tracing::debug;

use crate::context::ApplierContext;
use crate::error::{ApplierError, ApplierResult};
use crate::registry::EventApplier;

/// What an applier did to the entity projection, for callers that want
/// to react (e.g. the sync coordinator deciding what to push).
#[derive(Debug, Clone)]
pub enum Outcome {
    Created(Entity),
    Updated(Entity),
    Deleted(EntityGuid),
    NoOp,
}

fn entity_name(data: &serde_json::Value) -> String {
    data.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn parse_guid(value: &serde_json::Value) -> Option<EntityGuid> {
    value.as_str()?.parse().ok()
}

/// Builds the entity a `member` spec under `data.members` describes: if
/// it names an existing entity by guid, returns that guid unchanged;
/// otherwise creates a fresh Individual (or a Group, recursively
/// spawning its own nested members, if the spec carries its own
/// `members` array), reusing the same construction logic
/// create-individual/create-group use.
fn spawn_or_resolve_member(ctx: &ApplierContext<'_>, member: &serde_json::Value, timestamp: datacollect_types::EventTimestamp) -> ApplierResult<EntityGuid> {
    if let Some(guid) = member.get("guid").and_then(parse_guid) {
        if ctx.store.entity_exists(guid)? {
            return Ok(guid);
        }
    }

    let guid = EntityGuid::new();
    let name = entity_name(member);
    let data = member.get("data").cloned().unwrap_or(serde_json::Value::Null);

    let entity = if let Some(nested) = member.get("members").and_then(|m| m.as_array()) {
        let mut group = Entity::new_group(guid, name, data, timestamp);
        for child in nested {
            let child_guid = spawn_or_resolve_member(ctx, child, timestamp)?;
            group.add_member(child_guid);
        }
        group
    } else {
        Entity::new_individual(guid, name, data, timestamp)
    };

    ctx.store.save_entity(&EntityPair::fresh(entity))?;
    Ok(guid)
}

pub struct CreateIndividualApplier;

impl EventApplier for CreateIndividualApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        if ctx.store.entity_exists(event.entity_guid)? {
            debug!(guid = %event.entity_guid, "create-individual: entity already exists, no-op");
            return Ok(Outcome::NoOp);
        }
        let entity = Entity::new_individual(event.entity_guid, entity_name(&event.data), event.data.clone(), event.timestamp);
        ctx.store.save_entity(&EntityPair::fresh(entity.clone()))?;
        ctx.detect_duplicates(&entity)?;
        Ok(Outcome::Created(entity))
    }
}

pub struct CreateGroupApplier;

impl EventApplier for CreateGroupApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        if ctx.store.entity_exists(event.entity_guid)? {
            debug!(guid = %event.entity_guid, "create-group: entity already exists, no-op");
            return Ok(Outcome::NoOp);
        }
        let mut group = Entity::new_group(event.entity_guid, entity_name(&event.data), event.data.clone(), event.timestamp);
        if let Some(members) = event.data.get("members").and_then(|m| m.as_array()) {
            for member in members {
                let child_guid = spawn_or_resolve_member(ctx, member, event.timestamp)?;
                group.add_member(child_guid);
            }
        }
        ctx.store.save_entity(&EntityPair::fresh(group.clone()))?;
        ctx.detect_duplicates(&group)?;
        Ok(Outcome::Created(group))
    }
}

fn apply_shallow_update(ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
    if !ctx.store.entity_exists(event.entity_guid)? {
        return Err(ApplierError::EntityNotFound(event.entity_guid));
    }
    let updated = ctx.store.update_entity(event.entity_guid, |e| e.apply_update(&event.data, event.timestamp))?;
    Ok(Outcome::Updated(updated))
}

pub struct UpdateIndividualApplier;

impl EventApplier for UpdateIndividualApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        apply_shallow_update(ctx, event)
    }
}

pub struct UpdateGroupApplier;

impl EventApplier for UpdateGroupApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        apply_shallow_update(ctx, event)
    }
}

pub struct AddMemberApplier;

impl EventApplier for AddMemberApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        let pair = ctx.store.get_entity(event.entity_guid)?.ok_or(ApplierError::EntityNotFound(event.entity_guid))?;
        if !pair.modified.is_group() {
            return Err(ApplierError::InvalidGroup(event.entity_guid));
        }
        let members = event.data.get("members").and_then(|m| m.as_array()).cloned().unwrap_or_default();
        let mut member_guids = Vec::with_capacity(members.len());
        for member in &members {
            member_guids.push(spawn_or_resolve_member(ctx, member, event.timestamp)?);
        }
        let updated = ctx.store.update_entity(event.entity_guid, |e| {
            for guid in &member_guids {
                e.add_member(*guid);
            }
        })?;
        Ok(Outcome::Updated(updated))
    }
}

/// Deletes `guid` and, if it is a Group, every descendant it owns.
fn cascade_delete(ctx: &ApplierContext<'_>, guid: EntityGuid) -> ApplierResult<()> {
    if let Some(pair) = ctx.store.get_entity(guid)? {
        if pair.modified.is_group() {
            for member in pair.modified.member_ids().to_vec() {
                cascade_delete(ctx, member)?;
            }
        }
        ctx.store.delete_entity(guid)?;
    }
    Ok(())
}

pub struct RemoveMemberApplier;

impl EventApplier for RemoveMemberApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        let pair = ctx.store.get_entity(event.entity_guid)?.ok_or(ApplierError::EntityNotFound(event.entity_guid))?;
        if !pair.modified.is_group() {
            return Err(ApplierError::InvalidGroup(event.entity_guid));
        }
        let member_guid = event
            .data
            .get("memberId")
            .and_then(parse_guid)
            .ok_or_else(|| ApplierError::ValidationError("remove-member requires data.memberId".to_string()))?;

        let updated = ctx.store.update_entity(event.entity_guid, |e| {
            e.remove_member(member_guid);
        })?;
        cascade_delete(ctx, member_guid)?;
        Ok(Outcome::Updated(updated))
    }
}

pub struct DeleteEntityApplier;

impl EventApplier for DeleteEntityApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        if ctx.store.get_entity(event.entity_guid)?.is_none() {
            return Err(ApplierError::EntityNotFound(event.entity_guid));
        }
        cascade_delete(ctx, event.entity_guid)?;
        Ok(Outcome::Deleted(event.entity_guid))
    }
}

pub struct ResolveDuplicateApplier;

impl EventApplier for ResolveDuplicateApplier {
    fn apply(&self, ctx: &ApplierContext<'_>, event: &Event) -> ApplierResult<Outcome> {
        let duplicates = event
            .data
            .get("duplicates")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ApplierError::ValidationError("resolve-duplicate requires data.duplicates".to_string()))?;
        let should_delete = event.data.get("shouldDelete").and_then(|v| v.as_bool()).unwrap_or(false);

        // Keep each entry's own `duplicateGuid` alongside its canonical
        // form: canonicalization may swap entity_guid/duplicate_guid to
        // keep the potential-duplicate set order-independent, but the
        // operator's designated loser for deletion is always the event's
        // own `duplicateGuid`, not whichever guid ends up larger.
        let mut pairs = Vec::with_capacity(duplicates.len());
        for entry in duplicates {
            let entity_guid = entry.get("entityGuid").and_then(parse_guid);
            let duplicate_guid = entry.get("duplicateGuid").and_then(parse_guid);
            let (Some(a), Some(b)) = (entity_guid, duplicate_guid) else {
                return Err(ApplierError::ValidationError("resolve-duplicate entry requires entityGuid and duplicateGuid".to_string()));
            };
            pairs.push((PotentialDuplicatePair::canonical(a, b), b));
        }
        let canonical_pairs: Vec<_> = pairs.iter().map(|(pair, _)| *pair).collect();
        ctx.store.resolve_potential_duplicates(&canonical_pairs)?;

        if should_delete {
            for (_, duplicate_guid) in &pairs {
                cascade_delete(ctx, *duplicate_guid)?;
            }
        }
        Ok(Outcome::NoOp)
    }
}
