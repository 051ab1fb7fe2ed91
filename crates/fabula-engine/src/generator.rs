//! Unit generation.

use std::sync::Arc;

use fabula_core::error::DomainError;
use fabula_core::gateway::{ModelGateway, StoryDraft, StoryOpening};
use fabula_core::store::ConversationStore;
use fabula_core::story::Unit;
use tracing::{debug, warn};
use uuid::Uuid;

/// Builds fully rendered story units from conversation context.
///
/// A unit is only ever returned whole: image and audio render concurrently
/// and a failure of either fails the whole build, so no partial unit can
/// reach persistence.
pub struct UnitGenerator {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn ModelGateway>,
}

impl UnitGenerator {
    /// Creates a generator over the given store and gateway.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, gateway: Arc<dyn ModelGateway>) -> Self {
        Self { store, gateway }
    }

    /// Generates the opening of a brand-new story: title, icon, and the fully
    /// rendered unit 0.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Generation`] if any gateway call fails.
    pub async fn open_story(
        &self,
        conversation_id: Uuid,
        instruction: &str,
        voice: &str,
    ) -> Result<(StoryOpening, Unit), DomainError> {
        let opening = self.gateway.open_story(instruction).await?;
        let unit = self
            .render_unit(conversation_id, 0, opening.draft.clone(), voice)
            .await?;
        Ok((opening, unit))
    }

    /// Builds the continuation unit at `index` from the current conversation
    /// context. Runs the backend's self-check round when it has one: a
    /// rejected draft is regenerated once with the reviewer's objection.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the conversation is absent and
    /// [`DomainError::Generation`] if any gateway call fails.
    pub async fn build_unit(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        index: u32,
    ) -> Result<Unit, DomainError> {
        let context = self.store.story_context(owner_id, conversation_id).await?;
        debug!(%conversation_id, index, targets = %context.joined_targets(), "drafting continuation");

        let mut draft = self.gateway.continue_story(&context).await?;
        if let Some(objection) = self.gateway.review_draft(&context, &draft).await? {
            warn!(%conversation_id, index, objection, "draft rejected by review, revising once");
            draft = self
                .gateway
                .revise_draft(&context, &draft, &objection)
                .await?;
        }

        self.render_unit(conversation_id, index, draft, &context.voice)
            .await
    }

    /// Renders image and audio for a draft concurrently and assembles the
    /// unit once both are ready.
    async fn render_unit(
        &self,
        conversation_id: Uuid,
        index: u32,
        draft: StoryDraft,
        voice: &str,
    ) -> Result<Unit, DomainError> {
        let path_hint = format!("{conversation_id}/{index}");
        let narration_text = narration_prompt(&draft);

        let (image, audio) = tokio::try_join!(
            self.gateway.render_scene(&draft.scene_description, &path_hint),
            self.gateway.render_speech(&narration_text, voice, &path_hint),
        )?;

        Ok(Unit {
            index,
            target: draft.target,
            narration: draft.narration,
            intro: draft.intro,
            scene_description: draft.scene_description,
            image,
            audio,
        })
    }
}

/// Frames a draft's text for narration the way the product reads stories to
/// children.
fn narration_prompt(draft: &StoryDraft) -> String {
    format!(
        "Narrate this story for a five-year-old child, with a friendly and enthusiastic voice: {}\n{}",
        draft.narration, draft.intro
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fabula_core::media::MediaRef;
    use fabula_core::story::Conversation;
    use fabula_store::MemoryStore;
    use fabula_test_support::{FailingGateway, FixedClock, ScriptedGateway};

    fn memory_store() -> Arc<MemoryStore> {
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Arc::new(MemoryStore::new(Arc::new(FixedClock(fixed_now))))
    }

    async fn seeded_conversation(store: &MemoryStore) -> Uuid {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner_id: "alice".to_owned(),
            title: "A Scripted Story".to_owned(),
            icon: "book".to_owned(),
            voice: "Kore".to_owned(),
            last_update: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            units: Vec::new(),
            submissions: Vec::new(),
        };
        let id = conversation.id;
        store.insert_conversation(conversation).await.unwrap();
        store
            .append_unit(
                "alice",
                id,
                Unit {
                    index: 0,
                    target: "dragon".to_owned(),
                    narration: "Once upon a time there was a dragon.".to_owned(),
                    intro: "Can you draw the dragon?".to_owned(),
                    scene_description: "A dragon on a hill.".to_owned(),
                    image: MediaRef("memory://0/scene.png".to_owned()),
                    audio: MediaRef("memory://0/speech.mp3".to_owned()),
                },
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_open_story_returns_metadata_and_rendered_unit_zero() {
        // Arrange
        let store = memory_store();
        let gateway = Arc::new(ScriptedGateway::new());
        let generator = UnitGenerator::new(store, gateway);

        // Act
        let (opening, unit) = generator
            .open_story(Uuid::new_v4(), "a story about a dragon", "Kore")
            .await
            .unwrap();

        // Assert
        assert_eq!(opening.title, "A Scripted Story");
        assert_eq!(unit.index, 0);
        assert_eq!(unit.target, "dragon");
        assert!(unit.image.0.contains("/scene-"));
        assert!(unit.audio.0.contains("/speech-"));
    }

    #[tokio::test]
    async fn test_build_unit_uses_context_and_assigns_index() {
        // Arrange
        let store = memory_store();
        let conversation_id = seeded_conversation(&store).await;
        let gateway = Arc::new(ScriptedGateway::new());
        let generator = UnitGenerator::new(store, gateway);

        // Act
        let unit = generator
            .build_unit("alice", conversation_id, 1)
            .await
            .unwrap();

        // Assert
        assert_eq!(unit.index, 1);
        assert_eq!(unit.target, "item-1");
        assert_ne!(unit.target, "dragon");
    }

    #[tokio::test]
    async fn test_build_unit_revises_draft_once_when_review_objects() {
        // Arrange
        let store = memory_store();
        let conversation_id = seeded_conversation(&store).await;
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.push_objection("the target repeats an already-drawn item");
        let generator = UnitGenerator::new(store, Arc::clone(&gateway) as Arc<dyn ModelGateway>);

        // Act
        let unit = generator
            .build_unit("alice", conversation_id, 1)
            .await
            .unwrap();

        // Assert — the accepted draft is the revision, not the original.
        assert!(unit.target.starts_with("revised-"));
    }

    #[tokio::test]
    async fn test_build_unit_fails_whole_when_rendering_fails() {
        // Arrange
        let store = memory_store();
        let conversation_id = seeded_conversation(&store).await;
        let generator = UnitGenerator::new(store, Arc::new(FailingGateway));

        // Act
        let result = generator.build_unit("alice", conversation_id, 1).await;

        // Assert — no partial unit comes back.
        assert!(matches!(result, Err(DomainError::Generation(_))));
    }

    #[tokio::test]
    async fn test_build_unit_for_unknown_conversation_is_not_found() {
        // Arrange
        let store = memory_store();
        let generator = UnitGenerator::new(store, Arc::new(ScriptedGateway::new()));

        // Act
        let result = generator.build_unit("alice", Uuid::new_v4(), 1).await;

        // Assert
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
