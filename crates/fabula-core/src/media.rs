//! Media storage abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Reference to a stored media artifact (image or audio), as handed to
/// clients. The string is a store-relative path or URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob storage for generated and uploaded media.
///
/// Production storage is out of scope; implementations range from a local
/// directory to a cloud bucket.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `bytes` under `path` (no extension; the store derives one from
    /// `media_type`) and returns a reference clients can resolve.
    async fn put(
        &self,
        path: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaRef, DomainError>;
}

/// Maps a media type to the file extension used for stored artifacts.
#[must_use]
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        _ => "png",
    }
}
