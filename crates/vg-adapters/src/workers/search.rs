//! `search` worker: recency-oriented lookup. Does not require evidence
//! (the real web-fetch ingester is out of scope per the platform's purpose
//! statement; this worker drives the generation interface with a
//! search-oriented prompt scaffold).

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use vg_domain::{FusedEvidence, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{ProgressEmit, Worker, WorkerDeps};

pub struct SearchWorker {
    pub model_id: String,
}

impl<G: Generator> Worker<G> for SearchWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Search
    }

    fn requires_evidence(&self) -> bool {
        false
    }

    fn run<'a>(
        &'a self,
        query_text: &'a str,
        _fused_evidence: Option<&'a FusedEvidence>,
        progress_emit: ProgressEmit,
        deps: &'a WorkerDeps<G>,
    ) -> Pin<Box<dyn Future<Output = WorkerResult> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();
            progress_emit(format!("searching for recent material on: {query_text}\n"));

            let prompt = format!(
                "You are a recency-focused search assistant. Summarize the most current \
                 publicly known developments relevant to: {query_text}"
            );

            match deps.generator.generate(&prompt, &self.model_id).await {
                Ok(text) => WorkerResult {
                    worker_id: WorkerId::Search,
                    status: WorkerStatus::Ok,
                    output_text: text,
                    structured_output: Default::default(),
                    artifacts: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence_used: None,
                },
                Err(e) => WorkerResult::error(
                    WorkerId::Search,
                    vg_domain::WorkerErrorKind::GenerationUnavailable,
                    &e.to_string(),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }
}
