//! Conversation store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::story::{Conversation, ConversationSummary, StoryContext, Submission, Unit};

/// Document store for conversations and their units/submissions.
///
/// Every operation is scoped by `owner_id`: a conversation that exists but
/// belongs to someone else behaves exactly like one that does not exist.
/// Implementations must serialize appends per conversation so unit indices
/// stay dense and strictly increasing.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Inserts a freshly created conversation.
    async fn insert_conversation(&self, conversation: Conversation) -> Result<(), DomainError>;

    /// Fetches a full conversation owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the conversation does not exist
    /// or is owned by someone else.
    async fn get_conversation(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
    ) -> Result<Conversation, DomainError>;

    /// Lists the caller's conversations, most recently updated first.
    async fn list_conversations(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ConversationSummary>, DomainError>;

    /// Appends a unit and bumps the conversation's `last_update`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::OutOfOrder`] unless `unit.index` is exactly the
    /// next index in the sequence.
    async fn append_unit(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        unit: Unit,
    ) -> Result<(), DomainError>;

    /// Appends a correct submission and bumps `last_update`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::OutOfOrder`] if a submission already exists at
    /// that index or the graded unit does not exist.
    async fn append_submission(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        submission: Submission,
    ) -> Result<(), DomainError>;

    /// Builds the generation context for a conversation: concatenated
    /// narration history, the drawn-target list, and the latest scene image.
    async fn story_context(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
    ) -> Result<StoryContext, DomainError>;
}
