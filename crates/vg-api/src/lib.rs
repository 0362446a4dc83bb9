//! Vantage HTTP API Service
//!
//! Library surface for the axum wiring `main.rs` serves in production and
//! `tests/integration/*.rs` exercises in-process against stub adapters
//! (per SPEC_FULL.md's test-tooling section). `main.rs` only owns the CLI
//! parsing, tracing init, and listener bind/shutdown around `build_router`.

pub mod config;
pub mod handlers;
pub mod run;
pub mod sse;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Assemble the full route table over `state`, per §6's HTTP surface.
/// Shared by `run_serve` (bound to a real `TcpListener`) and the
/// integration test suite (bound to an ephemeral port via `tokio::net`).
pub fn build_router(state: AppState) -> Router {
    let cors_origins: Vec<_> = state.config.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors_origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::info::health))
        .route("/status", get(handlers::info::status))
        .route("/history", get(handlers::info::history))
        .route("/chat", post(handlers::chat::chat))
        .route("/v1/chat/completions", post(handlers::openai::chat_completions))
        .route("/v1/models", get(handlers::openai::list_models))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
