//! Application state for Axum handlers.

use relay_core::Orchestrator;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Holds the request orchestrator; everything request-scoped (correlation
/// ids, trace contexts) is created per call, so this clones cheaply into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Create the shared state from an assembled orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// The relay orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
