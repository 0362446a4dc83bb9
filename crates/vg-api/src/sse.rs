//! Streaming Transport (C9): adapts the internal `RunEvent` stream to two
//! wire formats — this platform's own SSE frames for `/chat`, and an
//! OpenAI-chat-completions-compatible chunk stream for
//! `/v1/chat/completions`.
//!
//! Grounded on `sr-api/src/handlers/prompt_loop.rs`'s `prompt_loop_stream`:
//! an `async_stream::stream!` block reading off an internal channel, wrapped
//! in `Sse::new(..).keep_alive(..)`.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vg_domain::RunEvent;

/// Cancels `token` when dropped. Moved into the `async_stream::stream!`
/// generator so an axum client disconnect (which drops the response body
/// future, and with it this guard) cancels the still-running pipeline
/// instead of leaving it to run to completion unread.
pub struct CancelOnDrop(pub CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[derive(Serialize)]
struct OpenAiDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAiChunkChoice {
    index: u32,
    delta: OpenAiDelta,
    finish_reason: Option<&'static str>,
}

#[derive(Serialize)]
struct OpenAiChunk {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: Vec<OpenAiChunkChoice>,
}

fn chunk_event(chunk_id: &str, model: &str, created: i64, content: Option<String>, finish_reason: Option<&'static str>) -> Event {
    let chunk = OpenAiChunk {
        id: chunk_id.to_string(),
        object: "chat.completion.chunk",
        created,
        model: model.to_string(),
        choices: vec![OpenAiChunkChoice { index: 0, delta: OpenAiDelta { content }, finish_reason }],
    };
    Event::default().data(serde_json::to_string(&chunk).unwrap_or_default())
}

/// Render a `Reflection` as the human-readable summary line §4.9's mapping
/// table calls for.
fn reflection_summary(reflection: &vg_domain::Reflection) -> String {
    if reflection.contradictions.is_empty() {
        format!("\n**reflection**: confidence {:.2}\n", reflection.confidence)
    } else {
        format!(
            "\n**reflection**: confidence {:.2}, contradictions: {}\n",
            reflection.confidence,
            reflection.contradictions.join("; ")
        )
    }
}

/// This platform's own wire format per §4.9's event→frame mapping: every
/// `RunEvent` becomes a chat-completion-chunk-shaped frame whose
/// `choices[0].delta.content` carries the mapped human-readable text, so a
/// generic chat client can render `/chat`'s stream the same way it renders
/// `/v1/chat/completions`'s. The stream ends after the first terminal
/// event (invariant 6): `done` emits a `finish_reason: "stop"` terminator
/// then `[DONE]`; `error` emits a content frame describing the error, a
/// `finish_reason: "error"` terminator, then `[DONE]`.
pub fn vantage_stream(
    mut rx: mpsc::Receiver<RunEvent>,
    chunk_id: String,
    model: String,
    created: i64,
    cancel_guard: CancelOnDrop,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let _cancel_guard = cancel_guard;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::WorkerStarted { worker_id } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(format!("🔍 {worker_id}: starting\n")), None));
                }
                RunEvent::WorkerProgress { text, .. } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(text), None));
                }
                RunEvent::WorkerCompleted { worker_id, summary } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(format!("✓ {worker_id}: {summary}\n")), None));
                }
                RunEvent::Phase { name } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(format!("\n**{name}**\n\n")), None));
                }
                RunEvent::SynthesisDelta { text } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(text), None));
                }
                RunEvent::Reflection { reflection } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(reflection_summary(&reflection)), None));
                }
                RunEvent::Done => {
                    yield Ok(chunk_event(&chunk_id, &model, created, None, Some("stop")));
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
                RunEvent::Error { kind, message } => {
                    yield Ok(chunk_event(&chunk_id, &model, created, Some(format!("error ({kind:?}): {message}\n")), None));
                    yield Ok(chunk_event(&chunk_id, &model, created, None, Some("error")));
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// OpenAI-compatible chunk stream: only `SynthesisDelta` text reaches the
/// client as `delta.content`; worker/phase/reflection events are internal
/// and have no OpenAI analogue, so they are swallowed here rather than
/// forwarded. `Done`/`Error` both terminate with `finish_reason: "stop"`
/// followed by the `[DONE]` sentinel — an in-band generation error still
/// yields a 200 response (the stream already started), so it surfaces as
/// a content chunk rather than a dropped connection.
pub fn openai_stream(
    mut rx: mpsc::Receiver<RunEvent>,
    chunk_id: String,
    model: String,
    created: i64,
    cancel_guard: CancelOnDrop,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let _cancel_guard = cancel_guard;
        loop {
            match rx.recv().await {
                Some(RunEvent::SynthesisDelta { text }) => {
                    let chunk = OpenAiChunk {
                        id: chunk_id.clone(),
                        object: "chat.completion.chunk",
                        created,
                        model: model.clone(),
                        choices: vec![OpenAiChunkChoice { index: 0, delta: OpenAiDelta { content: Some(text) }, finish_reason: None }],
                    };
                    yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                }
                Some(RunEvent::Error { message, .. }) => {
                    let chunk = OpenAiChunk {
                        id: chunk_id.clone(),
                        object: "chat.completion.chunk",
                        created,
                        model: model.clone(),
                        choices: vec![OpenAiChunkChoice { index: 0, delta: OpenAiDelta { content: Some(format!("[error: {message}]")) }, finish_reason: Some("stop") }],
                    };
                    yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
                Some(RunEvent::Done) => {
                    let chunk = OpenAiChunk {
                        id: chunk_id.clone(),
                        object: "chat.completion.chunk",
                        created,
                        model: model.clone(),
                        choices: vec![OpenAiChunkChoice { index: 0, delta: OpenAiDelta { content: None }, finish_reason: Some("stop") }],
                    };
                    yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
