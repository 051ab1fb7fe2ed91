//! Shared test mocks and utilities for Fabula.

mod clock;
mod gateway;
mod media;

pub use clock::FixedClock;
pub use gateway::{FailingGateway, ScriptedGateway};
pub use media::MemoryMediaStore;
