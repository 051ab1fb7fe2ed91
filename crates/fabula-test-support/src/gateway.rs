//! Test gateways — mock `ModelGateway` implementations for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use fabula_core::error::DomainError;
use fabula_core::gateway::{
    AudioClip, Drawing, ModelGateway, StoryDraft, StoryOpening, Verdict,
};
use fabula_core::media::MediaRef;
use fabula_core::story::StoryContext;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// A deterministic gateway producing a distinct target per continuation and
/// configurable verdicts, review objections, failure injection, and gating
/// of continuation calls (for races between background pre-generation and
/// submissions).
pub struct ScriptedGateway {
    first_target: String,
    counter: AtomicU32,
    verdicts: Mutex<VecDeque<Verdict>>,
    objections: Mutex<VecDeque<String>>,
    continue_gate: Mutex<Option<Arc<Semaphore>>>,
    fail_continuations: AtomicBool,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::with_first_target("dragon")
    }
}

impl ScriptedGateway {
    /// Creates a gateway whose opening draft targets `"dragon"`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway whose opening draft targets `first_target`.
    /// Continuations target `item-1`, `item-2`, … and therefore never repeat.
    #[must_use]
    pub fn with_first_target(first_target: &str) -> Self {
        Self {
            first_target: first_target.to_owned(),
            counter: AtomicU32::new(0),
            verdicts: Mutex::new(VecDeque::new()),
            objections: Mutex::new(VecDeque::new()),
            continue_gate: Mutex::new(None),
            fail_continuations: AtomicBool::new(false),
        }
    }

    /// Queues a verdict for the next `grade_drawing` call. Without a queued
    /// verdict, grading returns a correct verdict.
    pub fn push_verdict(&self, is_correct: bool, feedback: &str) {
        self.verdicts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Verdict {
                is_correct,
                feedback: feedback.to_owned(),
            });
    }

    /// Queues a review objection; the next `review_draft` call returns it,
    /// forcing the caller down the revise path.
    pub fn push_objection(&self, objection: &str) {
        self.objections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(objection.to_owned());
    }

    /// Gates every subsequent `continue_story` call behind a semaphore the
    /// test controls: each `add_permits(1)` releases exactly one call.
    pub fn gate_continuations(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self
            .continue_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
        gate
    }

    /// Makes every subsequent `continue_story` call fail.
    pub fn fail_continuations(&self, fail: bool) {
        self.fail_continuations.store(fail, Ordering::SeqCst);
    }

    /// How many continuation drafts have been produced so far.
    #[must_use]
    pub fn continuations(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    fn draft(target: String) -> StoryDraft {
        StoryDraft {
            narration: format!("The story continues, and a {target} appears."),
            intro: format!("Can you draw the {target}?"),
            scene_description: format!("A colorful scene featuring a {target}."),
            target,
        }
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn open_story(&self, _instruction: &str) -> Result<StoryOpening, DomainError> {
        Ok(StoryOpening {
            title: "A Scripted Story".to_owned(),
            icon: "book".to_owned(),
            draft: Self::draft(self.first_target.clone()),
        })
    }

    async fn continue_story(&self, _context: &StoryContext) -> Result<StoryDraft, DomainError> {
        if self.fail_continuations.load(Ordering::SeqCst) {
            return Err(DomainError::Generation(
                "scripted continuation failure".to_owned(),
            ));
        }
        let gate = self
            .continue_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| DomainError::Generation(e.to_string()))?;
            permit.forget();
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Self::draft(format!("item-{n}")))
    }

    async fn review_draft(
        &self,
        _context: &StoryContext,
        _draft: &StoryDraft,
    ) -> Result<Option<String>, DomainError> {
        Ok(self
            .objections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front())
    }

    async fn revise_draft(
        &self,
        _context: &StoryContext,
        _draft: &StoryDraft,
        _objection: &str,
    ) -> Result<StoryDraft, DomainError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Self::draft(format!("revised-item-{n}")))
    }

    async fn render_scene(
        &self,
        _description: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        Ok(MediaRef(format!(
            "memory://{path_hint}/scene-{}.png",
            Uuid::new_v4()
        )))
    }

    async fn render_speech(
        &self,
        _text: &str,
        _voice: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        Ok(MediaRef(format!(
            "memory://{path_hint}/speech-{}.mp3",
            Uuid::new_v4()
        )))
    }

    async fn grade_drawing(
        &self,
        _drawing: &Drawing,
        _expected_target: &str,
    ) -> Result<Verdict, DomainError> {
        Ok(self
            .verdicts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Verdict {
                is_correct: true,
                feedback: "What a wonderful drawing!".to_owned(),
            }))
    }

    async fn transcribe(&self, _audio: &AudioClip) -> Result<String, DomainError> {
        Ok(format!("a story about a {}", self.first_target))
    }
}

/// A gateway whose every capability fails with a generation error. Useful for
/// testing hard-failure surfacing on the synchronous path.
#[derive(Debug, Default)]
pub struct FailingGateway;

fn failure<T>() -> Result<T, DomainError> {
    Err(DomainError::Generation("model backend unavailable".to_owned()))
}

#[async_trait]
impl ModelGateway for FailingGateway {
    async fn open_story(&self, _instruction: &str) -> Result<StoryOpening, DomainError> {
        failure()
    }

    async fn continue_story(&self, _context: &StoryContext) -> Result<StoryDraft, DomainError> {
        failure()
    }

    async fn review_draft(
        &self,
        _context: &StoryContext,
        _draft: &StoryDraft,
    ) -> Result<Option<String>, DomainError> {
        failure()
    }

    async fn revise_draft(
        &self,
        _context: &StoryContext,
        _draft: &StoryDraft,
        _objection: &str,
    ) -> Result<StoryDraft, DomainError> {
        failure()
    }

    async fn render_scene(
        &self,
        _description: &str,
        _path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        failure()
    }

    async fn render_speech(
        &self,
        _text: &str,
        _voice: &str,
        _path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        failure()
    }

    async fn grade_drawing(
        &self,
        _drawing: &Drawing,
        _expected_target: &str,
    ) -> Result<Verdict, DomainError> {
        failure()
    }

    async fn transcribe(&self, _audio: &AudioClip) -> Result<String, DomainError> {
        failure()
    }
}
