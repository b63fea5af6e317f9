//! Language-model relay behind `POST /api/chat`.
//!
//! Providers are configured once at startup from their API keys. When a
//! request names no provider, the first configured one answers, in the order
//! Gemini, then HuggingFace.

pub mod gemini;
pub mod huggingface;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use common::{protocol::ChatTurn, ServiceError};
use thiserror::Error;

pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;

/// Reply used when a provider answers without any text.
pub const NO_REPLY: &str = "No response";

const KNOWN_PROVIDERS: [&str; 2] = [gemini::ID, huggingface::ID];

/// Errors produced while relaying a chat message.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no chat provider is configured")]
    NotConfigured,

    #[error("chat provider {0:?} is not supported")]
    Unsupported(String),

    /// The provider answered with a non-success status.
    #[error("{provider} returned status {status}")]
    Upstream { provider: &'static str, status: u16 },

    /// The request never produced a usable response.
    #[error("{provider} request failed: {detail}")]
    Transport {
        provider: &'static str,
        detail: String,
    },
}

impl From<ChatError> for ServiceError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Upstream { status, .. } => ServiceError::Upstream {
                status,
                message: err.to_string(),
            },
            ChatError::NotConfigured | ChatError::Unsupported(_) | ChatError::Transport { .. } => {
                ServiceError::Internal(err.to_string())
            }
        }
    }
}

/// A language-model backend that turns a history plus a new user message
/// into a reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Name clients use to request this provider (e.g. `"gemini"`).
    fn id(&self) -> &'static str;

    async fn reply(&self, history: &[ChatTurn], message: &str) -> Result<String, ChatError>;
}

/// The configured providers, in fallback order.
#[derive(Clone, Default)]
pub struct ChatProviders {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl ChatProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the providers whose keys are present. Blank keys count as absent.
    pub fn from_keys(gemini_key: Option<&str>, huggingface_key: Option<&str>) -> Self {
        let mut providers = Self::new();
        if let Some(key) = non_blank(gemini_key) {
            providers = providers.with(Arc::new(GeminiProvider::new(key)));
        }
        if let Some(key) = non_blank(huggingface_key) {
            providers = providers.with(Arc::new(HuggingFaceProvider::new(key)));
        }
        providers
    }

    /// Append a provider after the ones already registered.
    pub fn with(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Pick the provider for a request: the named one if given, otherwise the
    /// first configured.
    pub fn select(&self, requested: Option<&str>) -> Result<Arc<dyn ChatProvider>, ChatError> {
        let Some(name) = non_blank(requested) else {
            return self.providers.first().cloned().ok_or(ChatError::NotConfigured);
        };
        if !KNOWN_PROVIDERS.contains(&name) {
            return Err(ChatError::Unsupported(name.to_owned()));
        }
        self.providers
            .iter()
            .find(|p| p.id() == name)
            .cloned()
            .ok_or(ChatError::NotConfigured)
    }
}

impl fmt::Debug for ChatProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.id()))
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
