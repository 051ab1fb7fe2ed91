//! Test media store — records puts without touching the filesystem.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use fabula_core::error::DomainError;
use fabula_core::media::{MediaRef, MediaStore, extension_for};

/// Media store that discards bytes and records stored paths.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    paths: Mutex<Vec<String>>,
}

impl MemoryMediaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every path stored so far, in order.
    #[must_use]
    pub fn stored_paths(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(
        &self,
        path: &str,
        media_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<MediaRef, DomainError> {
        let relative = format!("{path}.{}", extension_for(media_type));
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(relative.clone());
        Ok(MediaRef(format!("memory://{relative}")))
    }
}
