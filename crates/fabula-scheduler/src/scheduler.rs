//! The continuation scheduler.

use std::sync::Arc;

use fabula_core::clock::Clock;
use fabula_core::error::DomainError;
use fabula_core::gateway::{AudioClip, Drawing, ModelGateway};
use fabula_core::media::MediaStore;
use fabula_core::store::ConversationStore;
use fabula_core::story::{Conversation, Submission, Unit};
use fabula_engine::{SubmissionGrader, UnitGenerator};
use fabula_store::PendingUnitCache;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::locks::AdvanceLocks;
use crate::tasks::TaskRegistry;

/// Voice used when the client does not pick one.
const DEFAULT_VOICE: &str = "Kore";

/// Input for opening a new story: a typed instruction, a spoken prompt, or
/// both (the instruction wins).
#[derive(Debug, Default)]
pub struct OpenStoryRequest {
    /// Typed story instruction.
    pub instruction: Option<String>,
    /// Spoken prompt, transcribed when no instruction is given.
    pub audio: Option<AudioClip>,
    /// Narration voice for the whole story.
    pub voice: Option<String>,
}

/// A graded submission plus whether this call persisted it. `recorded` is
/// `false` for incorrect verdicts (never persisted) and for re-submissions
/// against an already-recorded index.
#[derive(Debug)]
pub struct SubmissionOutcome {
    /// The graded submission, persisted only when `recorded`.
    pub submission: Submission,
    /// Whether this call appended the submission.
    pub recorded: bool,
}

/// Result of advancing the story by one unit.
#[derive(Debug)]
pub struct AdvanceOutcome {
    /// The unit at the advanced-to index.
    pub unit: Unit,
    /// Whether the unit came out of the pending cache (no model round-trip
    /// on the critical path).
    pub from_cache: bool,
    /// Whether this call appended the unit. `false` when a concurrent
    /// request advanced first and the existing unit is returned.
    pub appended: bool,
}

/// Combined response for the request/response submission path.
#[derive(Debug)]
pub struct SubmitResult {
    /// The graded submission.
    pub submission: Submission,
    /// The next story unit, present iff the drawing was correct.
    pub next_unit: Option<Unit>,
}

/// Orchestrates synchronous generation, background speculative generation,
/// and the single-slot pending-unit hand-off.
///
/// Per conversation the logical lifecycle is IDLE → GENERATING (a background
/// task is drafting the next unit) → READY (the unit is parked in the
/// pending cache) → IDLE again once an advance consumes it. An advance that
/// finds the slot empty — the race was lost, pre-generation failed, or none
/// was started — generates synchronously instead.
pub struct ContinuationScheduler {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn ModelGateway>,
    generator: Arc<UnitGenerator>,
    grader: SubmissionGrader,
    pending: Arc<PendingUnitCache>,
    locks: AdvanceLocks,
    tasks: Arc<TaskRegistry>,
    clock: Arc<dyn Clock>,
}

impl ContinuationScheduler {
    /// Wires the scheduler over its collaborators. The pending cache and the
    /// task registry are injected so callers (and tests) can observe them.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn ModelGateway>,
        media: Arc<dyn MediaStore>,
        pending: Arc<PendingUnitCache>,
        tasks: Arc<TaskRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let generator = Arc::new(UnitGenerator::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
        ));
        let grader = SubmissionGrader::new(Arc::clone(&gateway), media);
        Self {
            store,
            gateway,
            generator,
            grader,
            pending,
            locks: AdvanceLocks::default(),
            tasks,
            clock,
        }
    }

    /// The conversation store this scheduler persists through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Opens a new story: transcribes the prompt if it was spoken, generates
    /// and persists unit 0 synchronously, then kicks off background
    /// pre-generation of unit 1.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] when neither instruction nor audio
    /// is provided, and [`DomainError::Generation`] when the synchronous
    /// generation path fails.
    pub async fn open_story(
        &self,
        owner_id: &str,
        request: OpenStoryRequest,
    ) -> Result<Conversation, DomainError> {
        let instruction = match (request.instruction, request.audio) {
            (Some(text), _) if !text.trim().is_empty() => text,
            (_, Some(clip)) => self.gateway.transcribe(&clip).await?,
            _ => {
                return Err(DomainError::Validation(
                    "an instruction or an audio prompt is required".to_owned(),
                ));
            }
        };
        let voice = request
            .voice
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VOICE.to_owned());

        let conversation_id = Uuid::new_v4();
        let (opening, first_unit) = self
            .generator
            .open_story(conversation_id, &instruction, &voice)
            .await?;
        info!(%conversation_id, title = %opening.title, "story opened");

        self.store
            .insert_conversation(Conversation {
                id: conversation_id,
                owner_id: owner_id.to_owned(),
                title: opening.title,
                icon: opening.icon,
                voice,
                last_update: self.clock.now(),
                units: Vec::new(),
                submissions: Vec::new(),
            })
            .await?;
        self.store
            .append_unit(owner_id, conversation_id, first_unit)
            .await?;

        self.spawn_prefetch(owner_id, conversation_id, 1);

        self.store.get_conversation(owner_id, conversation_id).await
    }

    /// Grades a drawing against the latest unit and renders feedback audio.
    /// A correct verdict stores the drawing and appends the submission —
    /// unless one is already recorded at that index, in which case fresh
    /// feedback is returned without a second append.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] for unknown conversations and
    /// [`DomainError::Generation`] when grading or feedback rendering fails.
    pub async fn evaluate_submission(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        drawing: Drawing,
    ) -> Result<SubmissionOutcome, DomainError> {
        let conversation = self.store.get_conversation(owner_id, conversation_id).await?;
        let unit = conversation
            .units
            .last()
            .ok_or(DomainError::NotFound(conversation_id))?;
        let index = unit.index;

        let verdict = self.grader.grade(&drawing, &unit.target).await?;
        let feedback_audio = self
            .grader
            .render_feedback(&verdict, &conversation.voice, conversation_id, index)
            .await?;

        if !verdict.is_correct {
            // Incorrect attempts leave no persistent record; the child can
            // retry the same index until correct.
            return Ok(SubmissionOutcome {
                submission: Submission {
                    index,
                    is_correct: false,
                    feedback: verdict.feedback,
                    feedback_audio,
                    image: None,
                },
                recorded: false,
            });
        }

        let image = self
            .grader
            .store_drawing(&drawing, conversation_id, index)
            .await?;
        let submission = Submission {
            index,
            is_correct: true,
            feedback: verdict.feedback,
            feedback_audio,
            image: Some(image),
        };

        let _guard = self.locks.acquire(conversation_id).await;
        let current = self.store.get_conversation(owner_id, conversation_id).await?;
        if current.submissions.iter().any(|s| s.index == index) {
            debug!(%conversation_id, index, "submission already recorded, returning fresh feedback only");
            return Ok(SubmissionOutcome {
                submission,
                recorded: false,
            });
        }
        self.store
            .append_submission(owner_id, conversation_id, submission.clone())
            .await?;
        Ok(SubmissionOutcome {
            submission,
            recorded: true,
        })
    }

    /// Advances the conversation to `next_index`: hands off the pending unit
    /// when one is cached, otherwise generates synchronously; appends the
    /// unit; then kicks off pre-generation of the unit after it. Idempotent
    /// under concurrency — if another request already appended `next_index`,
    /// the existing unit is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::OutOfOrder`] when `next_index` is ahead of the
    /// sequence and [`DomainError::Generation`] when fallback generation
    /// fails.
    pub async fn advance(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        next_index: u32,
    ) -> Result<AdvanceOutcome, DomainError> {
        let _guard = self.locks.acquire(conversation_id).await;

        let conversation = self.store.get_conversation(owner_id, conversation_id).await?;
        let sequence_next = u32::try_from(conversation.units.len()).unwrap_or(u32::MAX);
        if sequence_next > next_index {
            let unit = conversation.units[next_index as usize].clone();
            debug!(%conversation_id, next_index, "already advanced by a concurrent request");
            return Ok(AdvanceOutcome {
                unit,
                from_cache: false,
                appended: false,
            });
        }
        if sequence_next < next_index {
            return Err(DomainError::OutOfOrder {
                conversation_id,
                expected: sequence_next,
                got: next_index,
            });
        }

        let (unit, from_cache) = match self.pending.pop(conversation_id) {
            Some(unit) if unit.index == next_index => {
                info!(%conversation_id, next_index, "pending unit hand-off");
                (unit, true)
            }
            Some(stale) => {
                warn!(
                    %conversation_id,
                    stale_index = stale.index,
                    next_index,
                    "discarding stale pending unit, generating synchronously"
                );
                (
                    self.generator
                        .build_unit(owner_id, conversation_id, next_index)
                        .await?,
                    false,
                )
            }
            None => {
                debug!(%conversation_id, next_index, "pending cache miss, generating synchronously");
                (
                    self.generator
                        .build_unit(owner_id, conversation_id, next_index)
                        .await?,
                    false,
                )
            }
        };

        self.store
            .append_unit(owner_id, conversation_id, unit.clone())
            .await?;
        self.spawn_prefetch(owner_id, conversation_id, next_index + 1);

        Ok(AdvanceOutcome {
            unit,
            from_cache,
            appended: true,
        })
    }

    /// Request/response submission path: evaluates the drawing and, when
    /// correct, advances the story in the same call.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::evaluate_submission`] and
    /// [`Self::advance`].
    pub async fn submit_drawing(
        &self,
        owner_id: &str,
        conversation_id: Uuid,
        drawing: Drawing,
    ) -> Result<SubmitResult, DomainError> {
        let outcome = self
            .evaluate_submission(owner_id, conversation_id, drawing)
            .await?;
        if !outcome.submission.is_correct {
            return Ok(SubmitResult {
                submission: outcome.submission,
                next_unit: None,
            });
        }
        let advance = self
            .advance(owner_id, conversation_id, outcome.submission.index + 1)
            .await?;
        Ok(SubmitResult {
            submission: outcome.submission,
            next_unit: Some(advance.unit),
        })
    }

    /// Fires background pre-generation of the unit at `index` into the
    /// pending cache. Fire-and-forget: a failure is logged and the slot stays
    /// empty, which the next advance resolves by synchronous fallback.
    fn spawn_prefetch(&self, owner_id: &str, conversation_id: Uuid, index: u32) {
        let generator = Arc::clone(&self.generator);
        let pending = Arc::clone(&self.pending);
        let owner_id = owner_id.to_owned();
        self.tasks.spawn(async move {
            debug!(%conversation_id, index, "pre-generating next unit");
            match generator.build_unit(&owner_id, conversation_id, index).await {
                Ok(unit) => {
                    pending.put(conversation_id, unit);
                    info!(%conversation_id, index, "pending unit ready");
                }
                Err(error) => {
                    warn!(
                        %conversation_id,
                        index,
                        %error,
                        "background pre-generation failed; next advance will generate synchronously"
                    );
                }
            }
        });
    }
}
