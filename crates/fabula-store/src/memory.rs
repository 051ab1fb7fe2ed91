//! In-memory conversation store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use fabula_core::clock::Clock;
use fabula_core::error::DomainError;
use fabula_core::store::ConversationStore;
use fabula_core::story::{Conversation, ConversationSummary, StoryContext, Submission, Unit};
use uuid::Uuid;

/// Conversation store backed by process memory, mirroring the product's
/// local (credential-free) mode. Appends for one conversation are serialized
/// by the store-wide write lock, which keeps index sequences dense without a
/// per-conversation lock of its own.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    conversations: RwLock<HashMap<Uuid, Conversation>>,
}

impl MemoryStore {
    /// Creates an empty store that stamps appends with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    fn owned<'a>(
        conversations: &'a HashMap<Uuid, Conversation>,
        owner_id: &str,
        conversation_id: Uuid,
    ) -> Result<&'a Conversation, DomainError> {
        conversations
            .get(&conversation_id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or(DomainError::NotFound(conversation_id))
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn insert_conversation(&self, conversation: Conversation) -> Result<(), DomainError> {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        conversations.insert(conversation.id, conversation);
        Ok(())
    }

    async fn get_conversation(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
    ) -> Result<Conversation, DomainError> {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Self::owned(&conversations, owner_id, conversation_id).cloned()
    }

    async fn list_conversations(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ConversationSummary>, DomainError> {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<ConversationSummary> = conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                icon: c.icon.clone(),
                voice: c.voice.clone(),
                last_update: c.last_update,
                unit_count: u32::try_from(c.units.len()).unwrap_or(u32::MAX),
            })
            .collect();
        summaries.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        Ok(summaries)
    }

    async fn append_unit(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        unit: Unit,
    ) -> Result<(), DomainError> {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Self::owned(&conversations, owner_id, conversation_id)?;
        let conversation = conversations
            .get_mut(&conversation_id)
            .ok_or(DomainError::NotFound(conversation_id))?;

        let expected = u32::try_from(conversation.units.len()).unwrap_or(u32::MAX);
        if unit.index != expected {
            return Err(DomainError::OutOfOrder {
                conversation_id,
                expected,
                got: unit.index,
            });
        }

        conversation.units.push(unit);
        conversation.last_update = self.clock.now();
        Ok(())
    }

    async fn append_submission(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        submission: Submission,
    ) -> Result<(), DomainError> {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Self::owned(&conversations, owner_id, conversation_id)?;
        let conversation = conversations
            .get_mut(&conversation_id)
            .ok_or(DomainError::NotFound(conversation_id))?;

        let unit_count = u32::try_from(conversation.units.len()).unwrap_or(u32::MAX);
        let duplicate = conversation
            .submissions
            .iter()
            .any(|s| s.index == submission.index);
        if duplicate || submission.index >= unit_count {
            return Err(DomainError::OutOfOrder {
                conversation_id,
                expected: u32::try_from(conversation.submissions.len()).unwrap_or(u32::MAX),
                got: submission.index,
            });
        }

        conversation.submissions.push(submission);
        conversation.last_update = self.clock.now();
        Ok(())
    }

    async fn story_context(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
    ) -> Result<StoryContext, DomainError> {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let conversation = Self::owned(&conversations, owner_id, conversation_id)?;
        Ok(StoryContext {
            history: conversation
                .units
                .iter()
                .map(|u| u.narration.clone())
                .collect(),
            drawn_targets: conversation.units.iter().map(|u| u.target.clone()).collect(),
            last_image: conversation.units.last().map(|u| u.image.clone()),
            voice: conversation.voice.clone(),
        })
    }
}
