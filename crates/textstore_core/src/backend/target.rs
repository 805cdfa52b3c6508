//! Shared, lock-guarded connection target.
//!
//! # Invariants
//! - `replace` takes the write lock; CRUD calls hold a read guard for their
//!   whole duration, so one call never observes two different targets.
//! - Last writer wins between concurrent `replace` calls.

use crate::model::target::ConnectionTarget;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Current target of one backend instance.
#[derive(Debug, Default)]
pub struct TargetSlot {
    inner: RwLock<ConnectionTarget>,
}

impl TargetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the current target.
    pub async fn replace(&self, target: ConnectionTarget) {
        *self.inner.write().await = target;
    }

    /// Returns a copy of the current target.
    pub async fn snapshot(&self) -> ConnectionTarget {
        self.inner.read().await.clone()
    }

    /// Pins the current target for the duration of one call.
    pub async fn pin(&self) -> RwLockReadGuard<'_, ConnectionTarget> {
        self.inner.read().await
    }
}
