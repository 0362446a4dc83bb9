//! `GET /health`, `GET /status`, `GET /history`: operational surface,
//! per §6.
//!
//! Grounded on `sr-api/src/main.rs`'s `health`/`info` handler shape.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use vg_domain::RunRecord;
use vg_ports::{CollaborationMemory, EvidenceStore};

use crate::handlers::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

#[derive(Debug, Serialize)]
pub struct CorpusStatus {
    pub corpus_id: String,
    pub reliability_weight: f64,
    pub tags: Vec<String>,
    /// Whether this corpus has a built index under `vector_index/`, or is
    /// only declared in the platform document so far.
    pub index_built: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkerStatusEntry {
    pub worker_id: String,
    pub model_id: String,
    pub requires_evidence: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub uptime_seconds: i64,
    pub corpora: Vec<CorpusStatus>,
    pub workers: Vec<WorkerStatusEntry>,
    pub embedding_model_id: String,
    pub reflection_model_id: String,
}

pub async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let mut corpora: Vec<CorpusStatus> = state
        .evidence_store
        .list_corpora()
        .await?
        .into_iter()
        .map(|c| CorpusStatus {
            corpus_id: c.corpus_id.as_str().to_string(),
            reliability_weight: c.reliability_weight,
            tags: c.tags.into_iter().collect(),
            index_built: true,
        })
        .collect();

    // Corpora declared in the platform document but not yet indexed are
    // still reported, per this field's own doc comment in config.rs.
    let built_ids: std::collections::HashSet<String> = corpora.iter().map(|c| c.corpus_id.clone()).collect();
    for declared in &state.config.platform.corpora {
        if !built_ids.contains(declared.id.as_str()) {
            corpora.push(CorpusStatus {
                corpus_id: declared.id.clone(),
                reliability_weight: declared.weight,
                tags: declared.tags.clone(),
                index_built: false,
            });
        }
    }

    let workers = state
        .config
        .platform
        .workers
        .iter()
        .map(|w| WorkerStatusEntry { worker_id: w.id.clone(), model_id: w.model_id.clone(), requires_evidence: w.requires_evidence })
        .collect();

    Ok(Json(StatusResponse {
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
        corpora,
        workers,
        embedding_model_id: state.config.embedding_model_id.clone(),
        reflection_model_id: state.config.reflection_model_id.clone(),
    }))
}

fn default_history_count() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_count")]
    pub n: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub runs: Vec<RunRecord>,
}

pub async fn history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> ApiResult<Json<HistoryResponse>> {
    let runs = state.memory.recent(query.n).await?;
    Ok(Json(HistoryResponse { runs }))
}
