//! Fabula Engine — unit generation and submission grading.
//!
//! The [`UnitGenerator`] turns conversation context into one fully rendered
//! story unit; the [`SubmissionGrader`] judges a drawing and renders its
//! feedback audio. Both are pure orchestration over the conversation store
//! and the model gateway; persistence stays with the caller.

mod generator;
mod grader;

pub use generator::UnitGenerator;
pub use grader::SubmissionGrader;
