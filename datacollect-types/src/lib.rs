//! Core type definitions for the datacollect engine.
//!
//! This crate defines the fundamental, storage-and-transport-agnostic
//! types shared by every other crate in the workspace:
//! - Entity, event, user, and tenant identifiers (UUID v7)
//! - Event timestamps and the per-user monotonic clock
//! - The `Event` (form submission) wire type
//!
//! Entity projections, the Merkle audit log, and sync wire DTOs all
//! build on top of these but live in their own crates.

mod event;
mod ids;
mod timestamp;

pub use event::{Event, EventType, KnownEventType, SyncLevel};
pub use ids::{EntityGuid, EventGuid, TenantId, UserId};
pub use timestamp::{EventTimestamp, MonotonicClock};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
}
