//! HTTP route handlers for the topic chat API.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chat::errors::{ChatError, GenerationError};
use crate::chat::ids::{SessionId, TopicId};
use crate::chat::topic::{Topic, TopicSummary};

use super::state::{AppState, SharedStore};

/// Error half of every handler result.
type ApiError = (StatusCode, String);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session}", delete(delete_session))
        .route(
            "/api/sessions/{session}/topics",
            get(list_topics).delete(clear_topics),
        )
        .route("/api/sessions/{session}/messages", post(submit_message))
        .route(
            "/api/sessions/{session}/active",
            get(get_active).put(select_topic),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let generator = state.generator();
    Json(serde_json::json!({
        "status": "ok",
        "service": "topic-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "generator": generator.name(),
        "generator_ready": generator.ready().await,
        "sessions": state.session_count().await,
    }))
}

/// Map a store error onto a status code.
fn chat_error(err: &ChatError) -> ApiError {
    let status = match err {
        ChatError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Generation(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        ChatError::Generation(_) => StatusCode::BAD_GATEWAY,
        ChatError::InvalidConfig(_) | ChatError::Pattern(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn parse_session(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::from_str(raw)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid session ID: {e}")))
}

async fn session_store(state: &AppState, raw: &str) -> Result<SharedStore, ApiError> {
    let id = parse_session(raw)?;
    state
        .session(&id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Session {id} not found")))
}

/// Session creation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    /// Identifier to use in every session route.
    pub session_id: String,
}

/// Open a new session.
async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let id = state.create_session().await.map_err(|e| chat_error(&e))?;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: id.to_string(),
        }),
    ))
}

/// Drop a session and its topics.
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session(&session)?;
    if state.remove_session(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Session {id} not found")))
    }
}

/// Topic listing entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopicDto {
    /// Topic identifier.
    pub id: String,
    /// Derived title.
    pub title: String,
    /// Messages in the topic.
    pub message_count: usize,
}

impl From<TopicSummary<'_>> for TopicDto {
    fn from(s: TopicSummary<'_>) -> Self {
        Self {
            id: s.id.to_string(),
            title: s.title.to_string(),
            message_count: s.message_count,
        }
    }
}

/// Topic listing response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopicListResponse {
    /// Topics, oldest first.
    pub topics: Vec<TopicDto>,
    /// Number of topics.
    pub count: usize,
    /// Active topic, if any.
    pub active: Option<String>,
}

/// List a session's topics.
async fn list_topics(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<Json<TopicListResponse>, ApiError> {
    let store = session_store(&state, &session).await?;
    let store = store.lock().await;

    let topics: Vec<TopicDto> = store.list_topics().map(TopicDto::from).collect();
    let count = topics.len();
    Ok(Json(TopicListResponse {
        topics,
        count,
        active: store.get_active().map(|t| t.id().to_string()),
    }))
}

/// Remove every topic of a session.
async fn clear_topics(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<StatusCode, ApiError> {
    let store = session_store(&state, &session).await?;
    store.lock().await.clear_all();
    Ok(StatusCode::NO_CONTENT)
}

/// Message submission request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The user's message.
    pub text: String,
}

/// Message submission response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Topic the message was routed to, now active.
    pub topic_id: String,
    /// Topic title.
    pub title: String,
    /// The assistant's reply.
    pub reply: String,
    /// Messages in the topic after the exchange.
    pub message_count: usize,
}

impl SubmitResponse {
    fn from_topic(topic: &Topic) -> Self {
        Self {
            topic_id: topic.id().to_string(),
            title: topic.title().to_string(),
            reply: topic
                .messages()
                .last()
                .map(|m| m.content().to_string())
                .unwrap_or_default(),
            message_count: topic.messages().len(),
        }
    }
}

/// Submit a message to a session.
async fn submit_message(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let store = session_store(&state, &session).await?;
    let mut store = store.lock().await;

    let id = store.submit(&request.text).await.map_err(|e| {
        if let ChatError::Generation(cause) = &e {
            log_generation_failure(&session, cause);
        }
        chat_error(&e)
    })?;

    store
        .topic(&id)
        .map(|t| Json(SubmitResponse::from_topic(t)))
        .ok_or_else(|| chat_error(&ChatError::NotFound(id)))
}

fn log_generation_failure(session: &str, cause: &GenerationError) {
    warn!("Generation failed for session {session}: {cause}");
}

/// Active topic selection request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectRequest {
    /// Topic to make active.
    pub topic_id: String,
}

/// Make an existing topic active.
async fn select_topic(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
    Json(request): Json<SelectRequest>,
) -> Result<StatusCode, ApiError> {
    let topic_id = TopicId::from_str(&request.topic_id)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid topic ID: {e}")))?;

    let store = session_store(&state, &session).await?;
    store
        .lock()
        .await
        .select_topic(&topic_id)
        .map_err(|e| chat_error(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Active topic response; `topic` is null until a topic is submitted or selected.
#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    /// The active topic with its full history.
    pub topic: Option<Topic>,
}

/// Fetch the active topic.
async fn get_active(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<Json<ActiveResponse>, ApiError> {
    let store = session_store(&state, &session).await?;
    let topic = store.lock().await.get_active().cloned();
    Ok(Json(ActiveResponse { topic }))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::chat::config::ChatConfig;
    use crate::chat::testing::{Script, ScriptedGenerator};

    fn app(script: Vec<Script>) -> Router {
        let generator = Arc::new(ScriptedGenerator::new(script));
        match AppState::new(generator, ChatConfig::default(), NonZeroUsize::MIN) {
            Ok(state) => create_router(state),
            Err(e) => panic!("state: {e}"),
        }
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("request for {uri}");
        };
        let Ok(response) = app.clone().oneshot(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = call(app, Method::POST, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Vec::new());
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["generator"], "scripted");
        assert_eq!(body["generator_ready"], true);
    }

    #[tokio::test]
    async fn test_submit_list_and_active() {
        let app = app(vec![
            Script::reply("Paris."),
            Script::reply("Capital"),
            Script::reply("Still Paris."),
        ]);
        let session = new_session(&app).await;
        let base = format!("/api/sessions/{session}");

        let (status, active) = call(&app, Method::GET, &format!("{base}/active"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(active["topic"].is_null());

        let body = serde_json::json!({ "text": "Capital of France?" });
        let (status, first) =
            call(&app, Method::POST, &format!("{base}/messages"), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["title"], "Capital");
        assert_eq!(first["reply"], "Paris.");
        assert_eq!(first["message_count"], 2);

        let body = serde_json::json!({ "text": "  capital of   FRANCE? " });
        let (status, second) =
            call(&app, Method::POST, &format!("{base}/messages"), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["topic_id"], first["topic_id"]);
        assert_eq!(second["message_count"], 4);

        let (_, list) = call(&app, Method::GET, &format!("{base}/topics"), None).await;
        assert_eq!(list["count"], 1);
        assert_eq!(list["topics"][0]["title"], "Capital");
        assert_eq!(list["active"], first["topic_id"]);

        let (_, active) = call(&app, Method::GET, &format!("{base}/active"), None).await;
        assert_eq!(active["topic"]["messages"][3]["content"], "Still Paris.");
        assert_eq!(active["topic"]["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let app = app(vec![Script::fail("model offline")]);
        let session = new_session(&app).await;
        let base = format!("/api/sessions/{session}");

        let body = serde_json::json!({ "text": "   " });
        let (status, _) = call(&app, Method::POST, &format!("{base}/messages"), Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let body = serde_json::json!({ "text": "hello" });
        let (status, _) = call(&app, Method::POST, &format!("{base}/messages"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, list) = call(&app, Method::GET, &format!("{base}/topics"), None).await;
        assert_eq!(list["count"], 0);

        let body = serde_json::json!({ "topic_id": TopicId::for_input("nowhere").to_string() });
        let (status, _) = call(&app, Method::PUT, &format!("{base}/active"), Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let body = serde_json::json!({ "topic_id": "short" });
        let (status, _) = call(&app, Method::PUT, &format!("{base}/active"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::GET, "/api/sessions/not-a-uuid/topics", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = format!("/api/sessions/{}/topics", SessionId::new());
        let (status, _) = call(&app, Method::GET, &unknown, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_select_clear_and_delete() {
        let app = app(vec![
            Script::reply("r1"),
            Script::reply("One"),
            Script::reply("r2"),
            Script::reply("Two"),
        ]);
        let session = new_session(&app).await;
        let base = format!("/api/sessions/{session}");

        let (_, first) = call(
            &app,
            Method::POST,
            &format!("{base}/messages"),
            Some(serde_json::json!({ "text": "first" })),
        )
        .await;
        call(
            &app,
            Method::POST,
            &format!("{base}/messages"),
            Some(serde_json::json!({ "text": "second" })),
        )
        .await;

        let body = serde_json::json!({ "topic_id": first["topic_id"] });
        let (status, _) = call(&app, Method::PUT, &format!("{base}/active"), Some(body)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, active) = call(&app, Method::GET, &format!("{base}/active"), None).await;
        assert_eq!(active["topic"]["title"], "One");

        let (status, _) = call(&app, Method::DELETE, &format!("{base}/topics"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, list) = call(&app, Method::GET, &format!("{base}/topics"), None).await;
        assert_eq!(list["count"], 0);
        assert!(list["active"].is_null());

        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
