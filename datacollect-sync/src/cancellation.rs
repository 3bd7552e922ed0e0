//! Cooperative cancellation signal for sync phases.
//!
//! The pack does not pull in `tokio-util`, so this is a plain
//! `Arc<AtomicBool>` flag in the shape of a `CancellationToken`,
//! checked at page boundaries by the Internal and External Sync
//! Coordinators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply cloneable flag a caller can set to request cancellation of
/// an in-progress sync. Checked between pages, never mid-page.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
