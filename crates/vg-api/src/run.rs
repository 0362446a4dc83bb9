//! The end-to-end run pipeline (C3 through C10): classify, retrieve, fuse,
//! dispatch, synthesize, reflect, adaptively re-run, persist.
//!
//! Grounded on `sr-adapters/src/governor.rs`'s "decide, then loop" shape,
//! generalized from one precondition check to the full multi-stage pipeline
//! §2's component diagram describes; each stage is already a unit elsewhere
//! in this workspace (`router::select`, `orchestrator::select`,
//! `evidence::fuse`, `Executor::execute`, `synthesize`, `reflect`) — this
//! module only sequences them and owns the adaptive re-run loop.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use vg_adapters::{condense, reflect, should_rerun, synthesize, CancellationToken};
use vg_domain::{orchestrator, router, CorpusId, ErrorKind, Framework, FusedEvidence, Reflection, RunEvent, RunId, RunRecord, WorkerId};
use vg_ports::{EvidenceStore, Generator};

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("generation service unavailable: {0}")]
    GenerationUnavailable(String),
}

impl RunError {
    fn as_event(&self) -> RunEvent {
        match self {
            RunError::GenerationUnavailable(message) => RunEvent::Error {
                kind: ErrorKind::GenerationUnavailable,
                message: message.clone(),
            },
        }
    }
}

/// Run one query end-to-end, streaming `RunEvent`s to `event_sink` as each
/// stage completes, returning the persisted `RunRecord` on success.
///
/// `event_sink` is a bounded channel; per §9, producers block on send
/// rather than drop events, so a slow SSE consumer applies backpressure all
/// the way back into worker dispatch instead of silently losing events.
#[instrument(skip(state, event_sink, cancellation), fields(query_len = query_text.len()))]
pub async fn run_query(
    state: &AppState,
    query_text: &str,
    event_sink: mpsc::Sender<RunEvent>,
    cancellation: CancellationToken,
) -> Result<RunRecord, RunError> {
    let started_at = chrono::Utc::now();
    let run_id = RunId::new();

    let route = router::select(query_text);

    let corpus_infos = state.evidence_store.list_corpora().await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to list corpora, proceeding with none");
        Vec::new()
    });
    let mut weight_by_corpus: BTreeMap<CorpusId, f64> =
        corpus_infos.iter().map(|c| (c.corpus_id.clone(), c.reliability_weight)).collect();
    let mut available: Vec<(CorpusId, Vec<String>)> =
        corpus_infos.iter().map(|c| (c.corpus_id.clone(), c.tags.iter().cloned().collect())).collect();

    // Declared corpora without a built index yet are still visible to the
    // Orchestrator (config.rs's `PlatformDocument::corpora` exists so a
    // corpus can be reported/selected before indexing finishes); retrieval
    // against one of these fails gracefully in `retrieve_and_fuse` below.
    for declared in &state.config.platform.corpora {
        let corpus_id = CorpusId::new(declared.id.clone());
        if !weight_by_corpus.contains_key(&corpus_id) {
            weight_by_corpus.insert(corpus_id.clone(), declared.weight);
            available.push((corpus_id, declared.tags.clone()));
        }
    }

    let context = orchestrator::select(query_text, &available);

    let _ = event_sink.send(RunEvent::Phase { name: "retrieval".to_string() }).await;
    let fused = retrieve_and_fuse(state, query_text, &context.corpora, &weight_by_corpus, context.framework).await;

    let _ = event_sink.send(RunEvent::Phase { name: "dispatch".to_string() }).await;
    let mut worker_results = state
        .executor
        .execute(
            &route.selected_workers,
            &state.registry,
            query_text,
            Some(&fused),
            state.generator.clone(),
            cancellation.child_token(),
            event_sink.clone(),
        )
        .await;

    let reflection_model_id = &state.config.reflection_model_id;

    let mut iteration_count: u32 = 1;
    let mut previous_rerun_len: Option<usize> = None;
    let mut best_text = String::new();
    let mut best_reflection = Reflection::degraded("pipeline did not complete an iteration");
    let mut best_results = worker_results.clone();
    let mut have_best = false;

    loop {
        let _ = event_sink.send(RunEvent::Phase { name: "synthesis".to_string() }).await;

        let synthesis_text = match synthesize(
            query_text,
            &fused,
            &worker_results,
            context.framework,
            state.generator.as_ref(),
            reflection_model_id,
            &event_sink,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                let err = RunError::GenerationUnavailable(e.to_string());
                let _ = event_sink.send(err.as_event()).await;
                return Err(err);
            }
        };

        let reflection = reflect(
            state.generator.clone(),
            reflection_model_id,
            query_text,
            &worker_results,
            &synthesis_text,
            state.config.reflection_deadline,
            cancellation.child_token(),
        )
        .await;

        let regressed = have_best && reflection.confidence < best_reflection.confidence;
        if !regressed {
            best_text = synthesis_text;
            best_reflection = reflection.clone();
            best_results = worker_results.clone();
            have_best = true;
        }

        if regressed || !should_rerun(&reflection, iteration_count, previous_rerun_len) {
            break;
        }

        let rerun_set = reflection.rerun.clone();
        previous_rerun_len = Some(rerun_set.len());

        let rerun_results = state
            .executor
            .execute(
                &rerun_set,
                &state.registry,
                query_text,
                Some(&fused),
                state.generator.clone(),
                cancellation.child_token(),
                event_sink.clone(),
            )
            .await;

        for result in rerun_results {
            worker_results.retain(|w| w.worker_id != result.worker_id);
            worker_results.push(result);
        }
        worker_results.sort_by_key(|r| {
            WorkerId::CANONICAL_ORDER
                .iter()
                .position(|c| *c == r.worker_id)
                .unwrap_or(usize::MAX)
        });

        iteration_count += 1;
    }

    if route.selected_workers.contains(&WorkerId::Redactor) {
        let _ = event_sink.send(RunEvent::Phase { name: "condensation".to_string() }).await;
        match condense(state.generator.as_ref(), reflection_model_id, &best_text).await {
            Ok(condensed) => best_text = condensed,
            Err(e) => warn!(error = %e, "redactor condensation failed, keeping full synthesis"),
        }
    }

    let _ = event_sink.send(RunEvent::Reflection { reflection: best_reflection.clone() }).await;
    let _ = event_sink.send(RunEvent::Done).await;

    let record = RunRecord {
        run_id,
        query: query_text.to_string(),
        task_kind: route.task_kind,
        selected_workers: route.selected_workers,
        framework: context.framework,
        worker_results: best_results,
        synthesis_text: best_text,
        reflection: best_reflection,
        iteration_count,
        started_at,
        finished_at: chrono::Utc::now(),
    };

    if let Err(e) = state.memory.append(record.clone()).await {
        warn!(error = %e, run_id = %record.run_id.as_str(), "failed to persist run record");
    }

    info!(run_id = %record.run_id.as_str(), iteration_count, confidence = record.reflection.confidence, "run complete");
    Ok(record)
}

/// Retrieve from every corpus in `corpora` concurrently and fuse the
/// results, per §4.2/§4.3. A corpus whose retrieval errors is dropped with
/// a warning rather than failing the whole run (graceful degradation).
async fn retrieve_and_fuse(
    state: &AppState,
    query_text: &str,
    corpora: &[CorpusId],
    weight_by_corpus: &BTreeMap<CorpusId, f64>,
    framework: Framework,
) -> FusedEvidence {
    if corpora.is_empty() {
        return FusedEvidence::empty(framework);
    }

    let retrievals = futures::future::join_all(corpora.iter().map(|corpus_id| async move {
        let result = state.evidence_store.retrieve(query_text, corpus_id, state.config.retrieval_top_k, state.config.strict_mode).await;
        (corpus_id.clone(), result)
    }))
    .await;

    let mut by_corpus = BTreeMap::new();
    for (corpus_id, result) in retrievals {
        match result {
            Ok(records) => {
                by_corpus.insert(corpus_id, records);
            }
            Err(e) => warn!(%corpus_id, error = %e, "corpus retrieval failed, excluding from fusion"),
        }
    }

    vg_domain::fuse(&by_corpus, |id| weight_by_corpus.get(id).copied().unwrap_or(1.0), framework)
}
