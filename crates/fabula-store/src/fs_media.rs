//! Filesystem media store.

use std::path::PathBuf;

use async_trait::async_trait;
use fabula_core::error::DomainError;
use fabula_core::media::{MediaRef, MediaStore, extension_for};

/// Media store writing artifacts under a local directory. The returned
/// references are `/media/`-prefixed paths the HTTP layer can serve or a
/// reverse proxy can resolve.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(
        &self,
        path: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaRef, DomainError> {
        let relative = format!("{path}.{}", extension_for(media_type));
        let full = self.root.join(&relative);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Storage(format!("creating media directory: {e}")))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| DomainError::Storage(format!("writing media file: {e}")))?;

        Ok(MediaRef(format!("/media/{relative}")))
    }
}
