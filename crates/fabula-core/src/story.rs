//! Story domain types.
//!
//! A [`Conversation`] is one ongoing story owned by a single user. It carries
//! an ordered sequence of [`Unit`]s (narrative order == insertion order) and
//! an ordered sequence of [`Submission`]s. Units and submissions are
//! immutable once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::media::MediaRef;

/// One ongoing story, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: Uuid,
    /// Identifier of the owning user. All reads and writes are scoped by it.
    pub owner_id: String,
    /// Story title produced by the opening generation round.
    pub title: String,
    /// Display icon shortcode for the story list.
    pub icon: String,
    /// Narration voice used for every audio render in this story.
    pub voice: String,
    /// Timestamp of the most recent append.
    pub last_update: DateTime<Utc>,
    /// Story units in narrative order. Indices are dense, starting at 0.
    pub units: Vec<Unit>,
    /// Graded drawing submissions, one per correctly-drawn unit.
    pub submissions: Vec<Submission>,
}

/// One turn of the story: narration, a drawable target, and its rendered
/// artifacts. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// 0-based position within the conversation. Dense and strictly
    /// increasing; the store rejects any other append.
    pub index: u32,
    /// Name of the object the child is asked to draw.
    pub target: String,
    /// Narrated story text for this turn.
    pub narration: String,
    /// Short intro phrase inviting the child to draw.
    pub intro: String,
    /// Scene description the image render was produced from.
    pub scene_description: String,
    /// Rendered scene image.
    pub image: MediaRef,
    /// Rendered narration audio.
    pub audio: MediaRef,
}

/// A graded drawing attempt. Only correct attempts are ever persisted, so a
/// stored submission always has `is_correct == true`; the type still carries
/// the flag because the same shape is returned to callers for incorrect
/// attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Index of the unit this submission graded.
    pub index: u32,
    /// Verdict from the vision model.
    pub is_correct: bool,
    /// Encouraging feedback text for the child.
    pub feedback: String,
    /// Rendered feedback audio. Always present, correct or not.
    pub feedback_audio: MediaRef,
    /// The stored drawing. Populated only when the verdict was correct.
    pub image: Option<MediaRef>,
}

/// Listing view of a conversation, without units or submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier.
    pub id: Uuid,
    /// Story title.
    pub title: String,
    /// Display icon shortcode.
    pub icon: String,
    /// Narration voice.
    pub voice: String,
    /// Timestamp of the most recent append.
    pub last_update: DateTime<Utc>,
    /// Number of units appended so far.
    pub unit_count: u32,
}

/// The conversation context fed to continuation generation.
#[derive(Debug, Clone, Default)]
pub struct StoryContext {
    /// Narrated text of every unit so far, in order.
    pub history: Vec<String>,
    /// Every target already requested, in order. A continuation draft must
    /// not repeat any of these.
    pub drawn_targets: Vec<String>,
    /// Reference to the most recently rendered scene image, if any.
    pub last_image: Option<MediaRef>,
    /// Narration voice of the conversation.
    pub voice: String,
}

impl StoryContext {
    /// The full narration so far as one concatenated text.
    #[must_use]
    pub fn joined_history(&self) -> String {
        self.history.join("\n")
    }

    /// The already-drawn targets as a comma-joined list.
    #[must_use]
    pub fn joined_targets(&self) -> String {
        self.drawn_targets.join(", ")
    }
}
