//! `analyst` worker: structured analytical pass over fused evidence.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use vg_domain::{FusedEvidence, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{ProgressEmit, Worker, WorkerDeps};

pub struct AnalystWorker {
    pub model_id: String,
}

impl<G: Generator> Worker<G> for AnalystWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Analyst
    }

    fn requires_evidence(&self) -> bool {
        true
    }

    fn run<'a>(
        &'a self,
        query_text: &'a str,
        fused_evidence: Option<&'a FusedEvidence>,
        progress_emit: ProgressEmit,
        deps: &'a WorkerDeps<G>,
    ) -> Pin<Box<dyn Future<Output = WorkerResult> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();
            progress_emit("reviewing fused evidence\n".to_string());

            let evidence_text = fused_evidence
                .map(|fe| {
                    fe.records
                        .iter()
                        .take(10)
                        .map(|r| format!("- [{}] {}", r.corpus_id, r.text))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();

            let prompt = format!(
                "Perform an analytical assessment of the following query, grounded strictly \
                 in the provided evidence. Note trends, drivers, and second-order effects.\n\n\
                 Query: {query_text}\n\nEvidence:\n{evidence_text}"
            );

            progress_emit("drafting analysis\n".to_string());

            match deps.generator.generate(&prompt, &self.model_id).await {
                Ok(text) => WorkerResult {
                    worker_id: WorkerId::Analyst,
                    status: WorkerStatus::Ok,
                    output_text: text,
                    structured_output: Default::default(),
                    artifacts: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence_used: fused_evidence.cloned(),
                },
                Err(e) => WorkerResult::error(
                    WorkerId::Analyst,
                    vg_domain::WorkerErrorKind::GenerationUnavailable,
                    &e.to_string(),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }
}
