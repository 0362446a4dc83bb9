//! `POST /chat`: this platform's own chat endpoint, per §6.
//!
//! Grounded on `sr-api/src/handlers/prompt_loop.rs`'s request/response shape
//! (a free-form prompt in, a streaming or buffered response out).

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use ulid::Ulid;
use vg_domain::{Query, RunEvent};

use crate::handlers::error::ApiError;
use crate::run::run_query;
use crate::sse::{vantage_stream, CancelOnDrop};
use crate::state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: String,
    pub duration_seconds: f64,
    pub workers_used: Vec<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[instrument(skip(state, body), fields(query_len = body.text.len(), stream = body.stream))]
pub async fn chat(State(state): State<AppState>, Json(body): Json<Query>) -> Response {
    if body.text.trim().is_empty() {
        return ApiError::BadRequest { message: "query must not be empty".to_string() }.into_response();
    }

    let cancellation = CancellationToken::new();
    let query = body.text.clone();
    let session_id = body.session_id.unwrap_or_default().as_str().to_string();

    if body.stream {
        let (tx, rx) = mpsc::channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);
        let run_state = state.clone();
        let run_cancellation = cancellation.clone();
        tokio::spawn(async move {
            let _ = run_query(&run_state, &query, tx, run_cancellation).await;
        });
        let chunk_id = format!("chatcmpl_{}", Ulid::new());
        let created = Utc::now().timestamp();
        let model = state.config.reflection_model_id.clone();
        return vantage_stream(rx, chunk_id, model, created, CancelOnDrop(cancellation)).into_response();
    }

    // Buffered mode: drain the event channel ourselves and wait on the
    // pipeline directly rather than spawning, so the handler can report a
    // single JSON body once the run finishes.
    let (buffer_tx, mut buffer_rx) = mpsc::channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);
    let started = std::time::Instant::now();
    let drain = tokio::spawn(async move {
        let mut workers_used = Vec::new();
        while let Some(event) = buffer_rx.recv().await {
            if let RunEvent::WorkerCompleted { worker_id, .. } = event {
                workers_used.push(worker_id.to_string());
            }
        }
        workers_used
    });

    let result = run_query(&state, &query, buffer_tx, cancellation).await;
    let workers_used = drain.await.unwrap_or_default();

    match result {
        Ok(record) => Json(ChatResponse {
            response: record.synthesis_text,
            status: "ok".to_string(),
            duration_seconds: started.elapsed().as_secs_f64(),
            workers_used,
            session_id,
            timestamp: Utc::now(),
        })
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
