//! Fabula API — HTTP and WebSocket surface.
//!
//! Exposed as a library so integration tests can build the full router with
//! test doubles behind the same state the binary wires up.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
