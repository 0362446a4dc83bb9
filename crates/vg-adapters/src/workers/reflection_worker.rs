//! `reflection` worker: the distinct generation call behind C8. Implements
//! `Worker` for deadline/cancellation/progress reuse, but is invoked
//! directly by the Reflection loop rather than dispatched through the
//! Router/Executor as an ordinary selected worker.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use vg_domain::{FusedEvidence, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{ProgressEmit, Worker, WorkerDeps};

pub struct ReflectionWorker {
    pub model_id: String,
}

impl<G: Generator> Worker<G> for ReflectionWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Reflection
    }

    fn requires_evidence(&self) -> bool {
        false
    }

    /// `query_text` here carries the already-assembled reflection prompt
    /// (query + worker outputs + synthesis), not the raw user query; the
    /// Reflection loop builds that prompt before invoking this worker.
    fn run<'a>(
        &'a self,
        query_text: &'a str,
        _fused_evidence: Option<&'a FusedEvidence>,
        progress_emit: ProgressEmit,
        deps: &'a WorkerDeps<G>,
    ) -> Pin<Box<dyn Future<Output = WorkerResult> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();
            progress_emit("scoring synthesis quality\n".to_string());

            match deps.generator.generate(query_text, &self.model_id).await {
                Ok(text) => WorkerResult {
                    worker_id: WorkerId::Reflection,
                    status: WorkerStatus::Ok,
                    output_text: text,
                    structured_output: Default::default(),
                    artifacts: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence_used: None,
                },
                Err(e) => WorkerResult::error(
                    WorkerId::Reflection,
                    vg_domain::WorkerErrorKind::GenerationUnavailable,
                    &e.to_string(),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }
}
