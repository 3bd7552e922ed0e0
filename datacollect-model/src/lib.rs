//! Entity projection model for the datacollect engine.
//!
//! Defines the shapes the Entity Store persists and the Event Applier
//! Service mutates:
//! - [`Entity`] — the tagged Individual/Group projection
//! - [`EntityPair`] — the `{initial, modified}` drift-detection wrapper
//! - [`AuditLogEntry`] — one signed record per applied event
//! - [`PotentialDuplicatePair`] — a canonicalized candidate-duplicate pair
//! - [`SyncCursors`] — per-tenant sync progress markers
//!
//! This crate has no knowledge of storage or transport; it is consumed
//! by the storage, applier, and sync crates alike.

mod audit;
mod cursors;
mod duplicate;
mod entity;
mod pair;

pub use audit::{AuditGuid, AuditLogEntry};
pub use cursors::SyncCursors;
pub use duplicate::PotentialDuplicatePair;
pub use entity::{Entity, EntityCommon};
pub use pair::EntityPair;
