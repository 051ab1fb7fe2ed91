//! Fabula Scheduler — the speculative pre-generation pipeline.
//!
//! The [`ContinuationScheduler`] decides, on every delivered unit, whether to
//! pre-generate the next one in the background, and on every correct
//! submission whether to hand off the cached pending unit or fall back to
//! synchronous generation. The [`session`] module expresses the streaming
//! delivery channel as a state machine over an abstract transport.

mod locks;
mod scheduler;
pub mod session;
mod tasks;

pub use scheduler::{
    AdvanceOutcome, ContinuationScheduler, OpenStoryRequest, SubmissionOutcome, SubmitResult,
};
pub use tasks::TaskRegistry;
