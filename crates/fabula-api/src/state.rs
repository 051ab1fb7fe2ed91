//! Shared application state.

use std::sync::Arc;

use fabula_core::auth::TokenVerifier;
use fabula_scheduler::{ContinuationScheduler, TaskRegistry};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The continuation scheduler every story operation goes through.
    pub scheduler: Arc<ContinuationScheduler>,
    /// Credential verification for bearer tokens and session auth messages.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Background task registry, drained on shutdown.
    pub tasks: Arc<TaskRegistry>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        scheduler: Arc<ContinuationScheduler>,
        verifier: Arc<dyn TokenVerifier>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            scheduler,
            verifier,
            tasks,
        }
    }
}
