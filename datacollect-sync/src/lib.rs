//! Internal and External Sync Coordinators.
//!
//! [`internal::InternalSyncCoordinator`] runs the paginated push/pull
//! protocol against the central server over a [`transport::SyncTransport`].
//! [`external::ExternalSyncCoordinator`] runs an independent,
//! adapter-driven push/pull against a foreign registry (the built-in
//! [`openspp::OpenSppAdapter`] being the reference implementation).
//! Both share the same Event Store, Entity Store, and Applier Registry
//! as the rest of the engine, and cooperate with in-flight cancellation
//! via [`cancellation::CancellationToken`].

pub mod backoff;
pub mod cancellation;
pub mod error;
pub mod external;
pub mod internal;
pub mod openspp;
pub mod transport;

pub use backoff::Backoff;
pub use cancellation::CancellationToken;
pub use error::{SyncError, SyncResult};
pub use external::{ExternalAdapterRegistry, ExternalPushOutcome, ExternalRecord, ExternalSyncAdapter, ExternalSyncAdapterConfig, ExternalSyncConfig, ExternalSyncCoordinator};
pub use internal::{InternalSyncConfig, InternalSyncCoordinator, SyncSummary};
pub use openspp::{OpenSppAdapter, OpenSppConfig};
pub use transport::{HttpSyncTransport, InMemorySyncTransport, SyncTransport};
