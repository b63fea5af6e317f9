//! Google Gemini provider.

use async_trait::async_trait;
use common::protocol::ChatTurn;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatError, ChatProvider, NO_REPLY};

pub(super) const ID: &str = "gemini";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-pro";

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: API_BASE.into(),
        }
    }

    /// Point the provider at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn id(&self) -> &'static str {
        ID
    }

    async fn reply(&self, history: &[ChatTurn], message: &str) -> Result<String, ChatError> {
        let contents = history
            .iter()
            .map(|turn| GeminiContent::new(turn.is_user(), &turn.content))
            .chain(std::iter::once(GeminiContent::new(true, message)))
            .collect();

        // The key travels as a query parameter; strip URLs from errors.
        let response = self
            .client
            .post(format!("{}/models/{MODEL}:generateContent", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&GeminiRequest { contents })
            .send()
            .await
            .map_err(|e| transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Upstream {
                provider: ID,
                status: status.as_u16(),
            });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| transport(e.without_url()))?;
        Ok(body.first_text().unwrap_or_else(|| NO_REPLY.to_owned()))
    }
}

fn transport(err: reqwest::Error) -> ChatError {
    ChatError::Transport {
        provider: ID,
        detail: err.to_string(),
    }
}

// ── API Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: [GeminiPart<'a>; 1],
}

impl<'a> GeminiContent<'a> {
    fn new(from_user: bool, text: &'a str) -> Self {
        Self {
            role: if from_user { "user" } else { "model" },
            parts: [GeminiPart { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GeminiResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    const PATH: &str = "/models/gemini-pro:generateContent";

    #[tokio::test]
    async fn sends_history_and_reads_first_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "g-key".into()))
            .match_body(Matcher::Json(json!({
                "contents": [
                    { "role": "model", "parts": [{ "text": "How can I help?" }] },
                    { "role": "user", "parts": [{ "text": "Where is my order?" }] }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{ "content": { "parts": [{ "text": "It shipped today." }] } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = GeminiProvider::new("g-key").with_base_url(server.url());
        let history = vec![ChatTurn {
            role: "bot".into(),
            content: "How can I help?".into(),
        }];
        let reply = provider.reply(&history, "Where is my order?").await.unwrap();

        assert_eq!(reply, "It shipped today.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_answer_becomes_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new("g-key").with_base_url(server.url());
        assert_eq!(provider.reply(&[], "hi").await.unwrap(), NO_REPLY);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let provider = GeminiProvider::new("g-key").with_base_url(server.url());
        let err = provider.reply(&[], "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Upstream {
                provider: "gemini",
                status: 403
            }
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let shown = format!("{:?}", GeminiProvider::new("secret-key"));
        assert!(!shown.contains("secret-key"));
    }
}
