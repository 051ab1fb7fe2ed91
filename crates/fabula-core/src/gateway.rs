//! Model gateway abstraction.
//!
//! A [`ModelGateway`] is the single seam to every external generative
//! capability: story text generation, drawing grading, scene image rendering,
//! speech synthesis, and transcription. Backends are interchangeable and
//! selected at construction time.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::media::MediaRef;
use crate::story::StoryContext;

/// One generated story turn before rendering: the text fields of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDraft {
    /// Object the child will be asked to draw. Must not repeat an
    /// already-drawn target.
    pub target: String,
    /// Story text to narrate, at most a short paragraph.
    pub narration: String,
    /// Short phrase inviting the child to draw the target.
    pub intro: String,
    /// Description of the scene to render as an illustration.
    pub scene_description: String,
}

/// Result of the opening generation round: story metadata plus the first
/// draft.
#[derive(Debug, Clone)]
pub struct StoryOpening {
    /// Title for the new story.
    pub title: String,
    /// Display icon shortcode.
    pub icon: String,
    /// Draft of unit 0.
    pub draft: StoryDraft,
}

/// Verdict of the vision model on a submitted drawing.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Whether the drawing shows the expected target.
    pub is_correct: bool,
    /// Short encouraging feedback for the child.
    pub feedback: String,
}

/// An uploaded drawing (or any client-provided image payload).
#[derive(Debug, Clone)]
pub struct Drawing {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Media type of `data`, e.g. `image/png`.
    pub media_type: String,
}

/// An uploaded audio clip carrying a spoken prompt.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Raw audio bytes.
    pub data: Vec<u8>,
    /// Media type of `data`, e.g. `audio/wav`.
    pub media_type: String,
}

/// Uniform interface to pluggable generation backends.
///
/// Rendering calls take a `path_hint` (`"{conversation_id}/{unit_index}"`)
/// telling the backend where to store the artifact; backends append a
/// per-event-unique filename so repeated renders never collide.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generates the opening of a new story from the child's instruction.
    async fn open_story(&self, instruction: &str) -> Result<StoryOpening, DomainError>;

    /// Generates the next story draft from the conversation context.
    async fn continue_story(&self, context: &StoryContext) -> Result<StoryDraft, DomainError>;

    /// Self-check round over a continuation draft. Returns `None` when the
    /// draft is acceptable, or `Some(objection)` describing what to fix.
    /// Backends without a review capability return `Ok(None)`.
    async fn review_draft(
        &self,
        context: &StoryContext,
        draft: &StoryDraft,
    ) -> Result<Option<String>, DomainError>;

    /// Regenerates a rejected draft once, guided by the reviewer's objection.
    async fn revise_draft(
        &self,
        context: &StoryContext,
        draft: &StoryDraft,
        objection: &str,
    ) -> Result<StoryDraft, DomainError>;

    /// Renders a scene illustration from its description.
    async fn render_scene(
        &self,
        description: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError>;

    /// Synthesizes speech for `text` at the given voice.
    async fn render_speech(
        &self,
        text: &str,
        voice: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError>;

    /// Judges whether a drawing shows the expected target.
    async fn grade_drawing(
        &self,
        drawing: &Drawing,
        expected_target: &str,
    ) -> Result<Verdict, DomainError>;

    /// Transcribes a spoken prompt to text.
    async fn transcribe(&self, audio: &AudioClip) -> Result<String, DomainError>;
}
