//! `POST /v1/chat/completions` and `GET /v1/models`: an
//! OpenAI-chat-completions-compatible surface over the same pipeline,
//! per §6.
//!
//! Grounded on `sr-api/src/handlers/prompt_loop.rs`'s streaming handler,
//! re-shaped around the OpenAI wire format rather than this platform's own.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use ulid::Ulid;
use vg_domain::RunEvent;

use crate::handlers::error::ApiError;
use crate::run::run_query;
use crate::sse::{openai_stream, CancelOnDrop};
use crate::state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[allow(dead_code)]
    pub role: String,
    pub content: String,
}

fn default_stream() -> bool {
    false
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ChatCompletionMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

/// The last `user`-or-otherwise message becomes the query text; OpenAI
/// clients conventionally put the live turn last regardless of role.
fn extract_query(messages: &[ChatMessage]) -> Option<&str> {
    messages.last().map(|m| m.content.as_str())
}

#[instrument(skip(state, body), fields(stream = body.stream))]
pub async fn chat_completions(State(state): State<AppState>, Json(body): Json<ChatCompletionRequest>) -> Response {
    let Some(query) = extract_query(&body.messages).filter(|q| !q.trim().is_empty()) else {
        return ApiError::BadRequest { message: "messages must contain at least one non-empty message".to_string() }.into_response();
    };
    let query = query.to_string();
    let model = body.model.unwrap_or_else(|| state.config.reflection_model_id.clone());
    let chunk_id = format!("chatcmpl_{}", Ulid::new());
    let created = chrono::Utc::now().timestamp();

    let cancellation = CancellationToken::new();

    if body.stream {
        let (tx, rx) = mpsc::channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);
        let run_state = state.clone();
        let run_cancellation = cancellation.clone();
        tokio::spawn(async move {
            let _ = run_query(&run_state, &query, tx, run_cancellation).await;
        });
        return openai_stream(rx, chunk_id, model, created, CancelOnDrop(cancellation)).into_response();
    }

    // `stream: false` still runs the pipeline with its internal streaming
    // fully intact (workers and synthesis stream onto an internal channel
    // exactly as in the streaming path) — only the HTTP response is
    // buffered into a single JSON body once the run finishes.
    let (tx, mut rx) = mpsc::channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);
    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
    let result = run_query(&state, &query, tx, cancellation).await;
    let _ = drain.await;

    match result {
        Ok(record) => Json(ChatCompletionResponse {
            id: chunk_id,
            object: "chat.completion",
            created,
            model,
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatCompletionMessage { role: "assistant", content: record.synthesis_text },
                finish_reason: "stop",
            }],
        })
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

/// `GET /v1/models`: report the configured `WorkerId`s as model
/// identifiers, since this deployment has no separate model registry.
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let data = state.registry.keys().map(|id| ModelEntry { id: id.to_string(), object: "model" }).collect();
    Json(ModelsResponse { object: "list", data })
}
