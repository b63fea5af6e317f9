//! Axum request handlers for all service endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use common::protocol::{
    ChatRequest, ChatResponse, ConversationListResponse, ConversationResponse,
    CreateConversationRequest, DeleteResponse, ErrorResponse, FeedbackRequest, HealthResponse,
    MessageResponse, SaveMessageRequest, SearchQuery, SearchResponse, Sender,
    UpdateConversationRequest,
};
use common::ServiceError;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::extract::ApiJson;
use super::middleware::sanitize;
use super::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// `GET /health` — liveness check.
///
/// Returns `200 OK` while the store answers, `503 Service Unavailable`
/// otherwise. Reports whether field encryption is active.
pub async fn health(State(state): State<AppState>) -> Response {
    let encryption = if state.repository.encryption_enabled() {
        "enabled"
    } else {
        "passthrough"
    };

    let (status_code, status_str, conversations) = match state.repository.conversation_count() {
        Ok(n) => (StatusCode::OK, "ok", n),
        Err(e) => {
            warn!(error = %e, "health check could not reach the store");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", 0)
        }
    };

    let body = HealthResponse {
        status: status_str.into(),
        timestamp: Utc::now().to_rfc3339(),
        encryption: encryption.into(),
        conversations,
    };
    (status_code, Json(body)).into_response()
}

/// `GET /api/conversations` — all conversations, most recent first.
pub async fn list_conversations(
    State(state): State<AppState>,
) -> ApiResult<Json<ConversationListResponse>> {
    let conversations = state.repository.list_conversations()?;
    Ok(Json(ConversationListResponse {
        success: true,
        conversations,
    }))
}

/// `POST /api/conversations` — create a conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<ConversationResponse>)> {
    let title = req.title.as_deref().map(sanitize);
    let conversation = state.repository.create_conversation(title.as_deref())?;
    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse {
            success: true,
            conversation,
            messages: None,
        }),
    ))
}

/// `GET /api/conversations/search?q=` — search decrypted titles and messages.
pub async fn search_conversations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let q = query.q.unwrap_or_default();
    let conversations = state.repository.search(&q)?;
    Ok(Json(SearchResponse {
        success: true,
        count: conversations.len(),
        conversations,
    }))
}

/// `GET /api/conversations/{id}` — a conversation with its messages.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationResponse>> {
    let (conversation, messages) = state.repository.get_conversation(parse_id(&id)?)?;
    Ok(Json(ConversationResponse {
        success: true,
        conversation,
        messages: Some(messages),
    }))
}

/// `PUT /api/conversations/{id}` — rename a conversation.
pub async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateConversationRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let id = parse_id(&id)?;
    let conversation = state.repository.update_title(id, &sanitize(&req.title))?;
    Ok(Json(ConversationResponse {
        success: true,
        conversation,
        messages: None,
    }))
}

/// `DELETE /api/conversations/{id}` — delete a conversation and its messages.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.repository.delete_conversation(parse_id(&id)?)?;
    Ok(Json(DeleteResponse { success: true }))
}

/// `POST /api/conversations/{id}/messages` — append a message.
///
/// User-authored content is sanitised; bot replies are stored as received.
pub async fn add_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SaveMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let conversation_id = parse_id(&id)?;
    let content = match req.sender {
        Sender::User => sanitize(&req.content),
        Sender::Bot => req.content,
    };
    let message = state
        .repository
        .add_message(conversation_id, &content, req.sender)?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message,
        }),
    ))
}

/// `PUT /api/messages/{id}/feedback` — set or clear a message rating.
pub async fn update_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let message = state
        .repository
        .update_feedback(parse_id(&id)?, req.feedback)?;
    Ok(Json(MessageResponse {
        success: true,
        message,
    }))
}

/// `POST /api/chat` — relay a user message to a language-model provider.
///
/// The message is sanitised before it leaves the service. A failing provider
/// status is passed through to the caller.
pub async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let raw = req
        .message
        .ok_or_else(|| ServiceError::BadRequest("message must be a non-empty string".into()))?;
    let message = sanitize(&raw);
    if message.is_empty() {
        return Err(ServiceError::BadRequest("message is empty".into()).into());
    }

    let provider = state.providers.select(req.provider.as_deref())?;
    debug!(
        provider = provider.id(),
        history_turns = req.history.len(),
        "relaying chat message"
    );
    let reply = provider.reply(&req.history, &message).await?;
    Ok(Json(ChatResponse {
        success: true,
        message: reply,
    }))
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn parse_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::BadRequest(format!("invalid id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatError, ChatProviders, MockChatProvider};
    use axum::routing::{get, post};
    use axum::{body::Body, http::Request, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn chat_router(providers: ChatProviders) -> Router {
        Router::new()
            .route("/chat", post(chat))
            .with_state(AppState::default().with_providers(providers))
    }

    async fn post_chat(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn replying(text: &'static str) -> ChatProviders {
        let mut mock = MockChatProvider::new();
        mock.expect_id().return_const("gemini");
        mock.expect_reply()
            .withf(|history, message| history.is_empty() && message == "hello")
            .returning(move |_, _| Ok(text.to_owned()));
        ChatProviders::new().with(Arc::new(mock))
    }

    fn test_router() -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/conversations/:id", get(get_conversation))
            .with_state(AppState::default())
    }

    #[tokio::test]
    async fn health_reports_passthrough() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.encryption, "passthrough");
        assert_eq!(body.conversations, 0);
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let app = test_router();
        let req = Request::builder()
            .uri("/conversations/not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = test_router();
        let req = Request::builder()
            .uri(format!("/conversations/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn parse_id_accepts_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert!(parse_id("42").is_err());
    }

    #[tokio::test]
    async fn chat_relays_sanitised_message() {
        let (status, body) = post_chat(
            chat_router(replying("Hi! How can I help?")),
            serde_json::json!({ "message": "  <hello>  " }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Hi! How can I help?");
    }

    #[tokio::test]
    async fn chat_requires_a_message() {
        let app = chat_router(replying("unused"));
        let (status, body) = post_chat(app.clone(), serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");

        let (status, _) = post_chat(app.clone(), serde_json::json!({ "message": 7 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_chat(app, serde_json::json!({ "message": " <> " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_without_provider_is_internal_error() {
        let (status, body) = post_chat(
            chat_router(ChatProviders::new()),
            serde_json::json!({ "message": "hello" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn chat_passes_upstream_status_through() {
        let mut mock = MockChatProvider::new();
        mock.expect_id().return_const("gemini");
        mock.expect_reply().returning(|_, _| {
            Err(ChatError::Upstream {
                provider: "gemini",
                status: 429,
            })
        });
        let (status, body) = post_chat(
            chat_router(ChatProviders::new().with(Arc::new(mock))),
            serde_json::json!({ "message": "hello" }),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "upstream_error");
    }
}
