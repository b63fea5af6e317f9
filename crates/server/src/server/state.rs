//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::chat::ChatProviders;
use crate::crypto::FieldCipher;
use crate::store::{ConversationRepository, MemoryStore};

use super::throttle::RateLimiter;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-backed) so that Axum can clone the
/// state for each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Conversation persistence with field encryption at rest.
    pub repository: ConversationRepository,
    /// Per-client request budget for `/api/`.
    pub limiter: RateLimiter,
    /// Language-model providers for `/api/chat`.
    pub providers: ChatProviders,
}

impl AppState {
    /// Create a new [`AppState`] from a repository and a limiter.
    pub fn new(repository: ConversationRepository, limiter: RateLimiter) -> Self {
        Self {
            repository,
            limiter,
            providers: ChatProviders::new(),
        }
    }

    /// Replace the chat providers. No providers means `/api/chat` answers 500.
    #[must_use]
    pub fn with_providers(mut self, providers: ChatProviders) -> Self {
        self.providers = providers;
        self
    }
}

impl Default for AppState {
    /// An empty in-memory store with encryption disabled and no chat
    /// providers, suitable for tests.
    fn default() -> Self {
        let repository = ConversationRepository::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FieldCipher::passthrough()),
        );
        Self::new(repository, RateLimiter::default())
    }
}
