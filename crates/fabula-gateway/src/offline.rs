//! Deterministic offline backend.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fabula_core::error::DomainError;
use fabula_core::gateway::{
    AudioClip, Drawing, ModelGateway, StoryDraft, StoryOpening, Verdict,
};
use fabula_core::media::{MediaRef, MediaStore};
use fabula_core::story::StoryContext;
use uuid::Uuid;

/// Drawable targets handed out in order, skipping already-drawn ones.
const TARGETS: [&str; 10] = [
    "dragon", "castle", "boat", "tree", "sun", "cat", "rocket", "flower", "fish", "bear",
];

/// A 1x1 transparent PNG, stored as the placeholder scene artifact.
const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Credential-free `ModelGateway` for development and demos: fixed story
/// text, a rotating target list that never repeats within a conversation,
/// and placeholder artifacts written through the media store so the full
/// delivery pipeline still runs end to end.
pub struct OfflineGateway {
    media: Arc<dyn MediaStore>,
}

impl OfflineGateway {
    /// Creates an offline gateway writing placeholder artifacts to `media`.
    #[must_use]
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }

    fn draft_for(target: &str) -> StoryDraft {
        StoryDraft {
            target: target.to_owned(),
            narration: format!(
                "The adventure went on, and soon a wonderful {target} appeared right in \
                 front of our friends."
            ),
            intro: format!("Can you draw the {target}?"),
            scene_description: format!(
                "A bright, friendly storybook scene featuring a {target}, portrait frame."
            ),
        }
    }

    fn next_target(context: &StoryContext) -> String {
        TARGETS
            .iter()
            .find(|candidate| {
                !context
                    .drawn_targets
                    .iter()
                    .any(|drawn| drawn == *candidate)
            })
            .map_or_else(
                || format!("treasure chest number {}", context.drawn_targets.len() + 1),
                |candidate| (*candidate).to_owned(),
            )
    }
}

#[async_trait]
impl ModelGateway for OfflineGateway {
    async fn open_story(&self, instruction: &str) -> Result<StoryOpening, DomainError> {
        let _ = instruction;
        Ok(StoryOpening {
            title: "An Offline Adventure".to_owned(),
            icon: "sparkles".to_owned(),
            draft: Self::draft_for(TARGETS[0]),
        })
    }

    async fn continue_story(&self, context: &StoryContext) -> Result<StoryDraft, DomainError> {
        Ok(Self::draft_for(&Self::next_target(context)))
    }

    async fn review_draft(
        &self,
        _context: &StoryContext,
        _draft: &StoryDraft,
    ) -> Result<Option<String>, DomainError> {
        Ok(None)
    }

    async fn revise_draft(
        &self,
        context: &StoryContext,
        _draft: &StoryDraft,
        _objection: &str,
    ) -> Result<StoryDraft, DomainError> {
        Ok(Self::draft_for(&Self::next_target(context)))
    }

    async fn render_scene(
        &self,
        _description: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        let bytes = BASE64
            .decode(PLACEHOLDER_PNG)
            .map_err(|e| DomainError::Generation(format!("placeholder decode failed: {e}")))?;
        self.media
            .put(&format!("{path_hint}/scene-{}", Uuid::new_v4()), "image/png", bytes)
            .await
    }

    async fn render_speech(
        &self,
        text: &str,
        _voice: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        // No synthesis offline; the spoken text itself stands in for audio.
        self.media
            .put(
                &format!("{path_hint}/speech-{}", Uuid::new_v4()),
                "audio/mpeg",
                text.as_bytes().to_vec(),
            )
            .await
    }

    async fn grade_drawing(
        &self,
        _drawing: &Drawing,
        expected_target: &str,
    ) -> Result<Verdict, DomainError> {
        Ok(Verdict {
            is_correct: true,
            feedback: format!("What a wonderful {expected_target}! Great job!"),
        })
    }

    async fn transcribe(&self, _audio: &AudioClip) -> Result<String, DomainError> {
        Ok("Tell me a story about a friendly dragon.".to_owned())
    }
}
