//! HuggingFace Inference API provider.

use async_trait::async_trait;
use common::protocol::ChatTurn;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{ChatError, ChatProvider, NO_REPLY};

pub(super) const ID: &str = "huggingface";

const API_BASE: &str = "https://api-inference.huggingface.co/models";
const MODEL: &str = "microsoft/DialoGPT-medium";

#[derive(Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for HuggingFaceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HuggingFaceProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: API_BASE.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Flatten the exchange into a `Speaker: text` transcript, one turn per line.
fn transcript(history: &[ChatTurn], message: &str) -> String {
    history
        .iter()
        .map(|turn| (turn.is_user(), turn.content.as_str()))
        .chain(std::iter::once((true, message)))
        .map(|(from_user, text)| {
            let speaker = if from_user { "User" } else { "Assistant" };
            format!("{speaker}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The inference API answers either `[{generated_text}]` or `{generated_text}`.
fn generated_text(body: &Value) -> Option<&str> {
    let item = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    item.get("generated_text")?
        .as_str()
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl ChatProvider for HuggingFaceProvider {
    fn id(&self) -> &'static str {
        ID
    }

    async fn reply(&self, history: &[ChatTurn], message: &str) -> Result<String, ChatError> {
        let request = InferenceRequest {
            inputs: transcript(history, message),
            parameters: InferenceParameters {
                max_new_tokens: 250,
                temperature: 0.7,
            },
        };

        let response = self
            .client
            .post(format!("{}/{MODEL}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Upstream {
                provider: ID,
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(transport)?;
        Ok(generated_text(&body).unwrap_or(NO_REPLY).to_owned())
    }
}

fn transport(err: reqwest::Error) -> ChatError {
    ChatError::Transport {
        provider: ID,
        detail: err.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    #[test]
    fn transcript_labels_speakers() {
        let history = vec![
            ChatTurn {
                role: "user".into(),
                content: "hi".into(),
            },
            ChatTurn {
                role: "bot".into(),
                content: "hello".into(),
            },
        ];
        assert_eq!(
            transcript(&history, "refund?"),
            "User: hi\nAssistant: hello\nUser: refund?"
        );
    }

    #[test]
    fn generated_text_accepts_both_shapes() {
        assert_eq!(
            generated_text(&json!([{ "generated_text": "a" }])),
            Some("a")
        );
        assert_eq!(generated_text(&json!({ "generated_text": "b" })), Some("b"));
        assert_eq!(generated_text(&json!([])), None);
        assert_eq!(generated_text(&json!({ "error": "loading" })), None);
    }

    #[tokio::test]
    async fn sends_bearer_key_and_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/microsoft/DialoGPT-medium")
            .match_header("authorization", "Bearer hf-key")
            .match_body(Matcher::PartialJson(json!({ "inputs": "User: hi" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"generated_text":"Hello there"}]"#)
            .create_async()
            .await;

        let provider = HuggingFaceProvider::new("hf-key").with_base_url(server.url());
        assert_eq!(provider.reply(&[], "hi").await.unwrap(), "Hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/microsoft/DialoGPT-medium")
            .with_status(503)
            .with_body("model is loading")
            .create_async()
            .await;

        let provider = HuggingFaceProvider::new("hf-key").with_base_url(server.url());
        assert!(matches!(
            provider.reply(&[], "hi").await,
            Err(ChatError::Upstream {
                provider: "huggingface",
                status: 503
            })
        ));
    }
}
