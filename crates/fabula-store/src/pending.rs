//! Single-slot pending-unit cache.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use fabula_core::story::Unit;
use uuid::Uuid;

/// Holds at most one pre-generated, not-yet-delivered unit per conversation.
///
/// This cache is process-local on purpose: a pre-generated unit is a pure
/// speculation and is cheap to regenerate, so losing the cache on restart
/// only costs one synchronous fallback per conversation. `put` overwrites any
/// existing slot; `pop` is an atomic read-and-clear.
#[derive(Debug, Default)]
pub struct PendingUnitCache {
    slots: Mutex<HashMap<Uuid, Unit>>,
}

impl PendingUnitCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a pre-generated unit for `conversation_id`, replacing any unit
    /// already in the slot.
    pub fn put(&self, conversation_id: Uuid, unit: Unit) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slots.insert(conversation_id, unit) {
            tracing::debug!(
                %conversation_id,
                replaced_index = previous.index,
                "pending slot overwritten"
            );
        }
    }

    /// Removes and returns the pending unit for `conversation_id`, if any.
    /// Absence is not an error; it signals synchronous fallback generation.
    pub fn pop(&self, conversation_id: Uuid) -> Option<Unit> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conversation_id)
    }

    /// Whether a unit is currently parked for `conversation_id`.
    #[must_use]
    pub fn contains(&self, conversation_id: Uuid) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&conversation_id)
    }
}
