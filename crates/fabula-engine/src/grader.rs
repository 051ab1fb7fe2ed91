//! Submission grading and feedback rendering.

use std::sync::Arc;

use fabula_core::error::DomainError;
use fabula_core::gateway::{Drawing, ModelGateway, Verdict};
use fabula_core::media::{MediaRef, MediaStore};
use tracing::debug;
use uuid::Uuid;

/// Judges drawings against their expected target and renders feedback audio.
pub struct SubmissionGrader {
    gateway: Arc<dyn ModelGateway>,
    media: Arc<dyn MediaStore>,
}

impl SubmissionGrader {
    /// Creates a grader over the given gateway and media store.
    #[must_use]
    pub fn new(gateway: Arc<dyn ModelGateway>, media: Arc<dyn MediaStore>) -> Self {
        Self { gateway, media }
    }

    /// Asks the vision model whether `drawing` shows `expected_target`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Generation`] if the gateway call fails.
    pub async fn grade(
        &self,
        drawing: &Drawing,
        expected_target: &str,
    ) -> Result<Verdict, DomainError> {
        let verdict = self.gateway.grade_drawing(drawing, expected_target).await?;
        debug!(
            expected_target,
            is_correct = verdict.is_correct,
            "drawing graded"
        );
        Ok(verdict)
    }

    /// Renders feedback audio for a verdict. The tone is chosen here from the
    /// verdict: energetic praise when correct, gentle encouragement when not.
    /// The rendered filename is unique per call so clients never replay a
    /// cached clip for a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Generation`] if speech synthesis fails.
    pub async fn render_feedback(
        &self,
        verdict: &Verdict,
        voice: &str,
        conversation_id: Uuid,
        submission_index: u32,
    ) -> Result<MediaRef, DomainError> {
        let framed = feedback_prompt(verdict);
        self.gateway
            .render_speech(&framed, voice, &format!("{conversation_id}/{submission_index}"))
            .await
    }

    /// Persists a correct drawing to media storage.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if the write fails.
    pub async fn store_drawing(
        &self,
        drawing: &Drawing,
        conversation_id: Uuid,
        submission_index: u32,
    ) -> Result<MediaRef, DomainError> {
        let path = format!(
            "{conversation_id}/{submission_index}/drawing-{}",
            Uuid::new_v4()
        );
        self.media
            .put(&path, &drawing.media_type, drawing.data.clone())
            .await
    }
}

/// Frames feedback text with the speaking tone matching the verdict.
fn feedback_prompt(verdict: &Verdict) -> String {
    if verdict.is_correct {
        format!(
            "Cheer with energetic praise, like celebrating a big win: {}",
            verdict.feedback
        )
    } else {
        format!(
            "Speak gently and encouragingly, inviting another try: {}",
            verdict.feedback
        )
    }
}
