//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// A pending-cache miss is deliberately not represented here: the absence of
/// a pre-generated unit is the documented trigger for synchronous fallback
/// generation, not a failure.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The caller's credential is missing or invalid.
    #[error("unauthorized")]
    Unauthorized,

    /// A conversation was not found, or is not owned by the caller.
    #[error("conversation not found: {0}")]
    NotFound(Uuid),

    /// A request was malformed at the domain level.
    #[error("validation error: {0}")]
    Validation(String),

    /// A model gateway call failed (text, image, audio, or grading).
    #[error("generation failed: {0}")]
    Generation(String),

    /// An append would violate the dense-index ordering invariant.
    #[error("out-of-order append on conversation {conversation_id}: expected index {expected}, got {got}")]
    OutOfOrder {
        /// The conversation whose sequence was violated.
        conversation_id: Uuid,
        /// The index the sequence expects next.
        expected: u32,
        /// The index that was attempted.
        got: u32,
    },

    /// An infrastructure/persistence error.
    #[error("storage error: {0}")]
    Storage(String),
}
