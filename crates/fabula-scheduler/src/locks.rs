//! Per-conversation advance locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per conversation, created on demand. Everything that
/// records a submission or appends a unit for a conversation runs under its
/// lock, which is what keeps concurrent duplicate submissions from appending
/// twice.
#[derive(Debug, Default)]
pub(crate) struct AdvanceLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl AdvanceLocks {
    /// Acquires the lock for `conversation_id`, creating it on first use.
    pub(crate) async fn acquire(&self, conversation_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(conversation_id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}
