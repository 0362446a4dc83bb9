//! `redactor` worker: condenses a brief into an executive summary.
//! Dispatched as an ordinary worker within `selected_workers` per the
//! Router's summarization cue, same as any other worker in the Executor's
//! fan-out; since the synthesized brief doesn't exist yet at that point, its
//! `run()` produces executive framing for the query instead. The actual
//! condensation of the finished brief happens once, as the post-step the
//! Router's comment on the summarization cue promises (§4.5), via
//! `condense` below, invoked by the run pipeline after synthesis/reflection
//! settle on a final brief.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use vg_domain::{FusedEvidence, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{ProgressEmit, Worker, WorkerDeps};

pub struct RedactorWorker {
    pub model_id: String,
}

impl<G: Generator> Worker<G> for RedactorWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Redactor
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
            progress_emit("preparing executive summary framing\n".to_string());

            let prompt = format!(
                "In one short paragraph, state the executive framing for a brief answering: {query_text}"
            );

            match deps.generator.generate(&prompt, &self.model_id).await {
                Ok(text) => WorkerResult {
                    worker_id: WorkerId::Redactor,
                    status: WorkerStatus::Ok,
                    output_text: text,
                    structured_output: Default::default(),
                    artifacts: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence_used: None,
                },
                Err(e) => WorkerResult::error(
                    WorkerId::Redactor,
                    vg_domain::WorkerErrorKind::GenerationUnavailable,
                    &e.to_string(),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }
}

/// Condense an already-produced synthesis into an executive summary. Called
/// directly by the Synthesis Stage as a post-step when `redactor` was
/// selected, rather than through the Executor (the Executor's fan-out
/// happens before synthesis exists).
pub async fn condense<G: Generator>(generator: &G, model_id: &str, synthesis_text: &str) -> Result<String, vg_ports::GeneratorError> {
    let prompt = format!(
        "Condense the following intelligence brief into a three-sentence executive summary:\n\n{synthesis_text}"
    );
    generator.generate(&prompt, model_id).await
}
