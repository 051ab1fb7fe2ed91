//! Fabula Core — shared domain abstractions.
//!
//! This crate defines the domain types and the consumed interfaces
//! (conversation store, model gateway, media store, token verifier)
//! that every other crate depends on. It contains no infrastructure code.

pub mod auth;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod media;
pub mod story;
pub mod store;
