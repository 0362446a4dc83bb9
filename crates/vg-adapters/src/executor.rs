//! Parallel Executor (C6): bounded fan-out over the selected worker set,
//! emitting progress events and collecting `WorkerResult`s in canonical
//! order regardless of completion order.
//!
//! Grounded on `sr-adapters/src/governor.rs`'s precondition/decision/budget
//! loop shape, generalized from "one iteration" to "bounded fan-out of N
//! workers", and on the `fan_out` semaphore-bounded concurrent-task pattern
//! in `other_examples/.../src-agent-orchestrator.rs.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::{mpsc, Semaphore};
use tracing::{instrument, warn};
use vg_domain::{FusedEvidence, RunEvent, WorkerErrorKind, WorkerId, WorkerResult};
use vg_ports::Generator;

use crate::worker::{run_with_deadline, CancellationToken, ProgressEmit, Worker, WorkerDeps};

/// A worker registered for dispatch, paired with its configured deadline.
pub struct RegisteredWorker<G: Generator> {
    pub worker: Arc<dyn Worker<G>>,
    pub deadline: Duration,
}

/// Bounded-concurrency fan-out executor. One instance is created per run
/// (or reused across a process's runs; it carries no run-scoped state).
pub struct Executor {
    pub max_parallel: usize,
    pub overall_deadline: Duration,
    pub grace_window: Duration,
}

impl Executor {
    pub fn new(max_parallel: usize, overall_deadline: Duration, grace_window: Duration) -> Self {
        Self {
            max_parallel,
            overall_deadline,
            grace_window,
        }
    }

    /// Run `selected` (already in canonical order per `WorkerId::sort_canonical`)
    /// concurrently, bounded by `max_parallel` permits, per §4.6.
    ///
    /// `worker_started` events are emitted for the whole canonical-ordered set
    /// up front, sequentially, before any unit acquires its semaphore permit
    /// or invokes `run` — the only way to satisfy both "emitted before
    /// invoking the worker" (per-unit design) and "emitted in canonical
    /// order" (the cross-worker ordering guarantee) when dispatch itself is
    /// concurrency-bounded and may delay actual invocation.
    #[instrument(skip(self, registry, generator, cancellation, event_sink, fused_evidence))]
    pub async fn execute<G: Generator + 'static>(
        &self,
        selected: &[WorkerId],
        registry: &HashMap<WorkerId, RegisteredWorker<G>>,
        query_text: &str,
        fused_evidence: Option<&FusedEvidence>,
        generator: Arc<G>,
        cancellation: CancellationToken,
        event_sink: mpsc::Sender<RunEvent>,
    ) -> Vec<WorkerResult> {
        for worker_id in selected {
            let _ = event_sink.send(RunEvent::WorkerStarted { worker_id: *worker_id }).await;
        }

        let permits = self.max_parallel.clamp(1, selected.len().max(1));
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut in_flight = FuturesUnordered::new();
        let mut abort_handles = Vec::with_capacity(selected.len());
        let mut results: HashMap<WorkerId, WorkerResult> = HashMap::new();

        for worker_id in selected.iter().copied() {
            let Some(registered) = registry.get(&worker_id) else {
                warn!(%worker_id, "no registered worker for selected id, marking skipped");
                results.insert(
                    worker_id,
                    WorkerResult::skipped(worker_id, "worker not registered in this deployment"),
                );
                continue;
            };

            let worker = registered.worker.clone();
            let deadline = registered.deadline;
            let sem = semaphore.clone();
            let sink = event_sink.clone();
            let query = query_text.to_string();
            // Per the Worker Contract (C4): pass fused evidence only to
            // workers that declare they need it.
            let evidence = if worker.requires_evidence() { fused_evidence.cloned() } else { None };
            let gen = generator.clone();
            let worker_cancel = cancellation.child_token();

            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(p) => p,
                    Err(_) => {
                        return (
                            worker_id,
                            WorkerResult::error(worker_id, WorkerErrorKind::Internal, "semaphore closed", 0),
                        )
                    }
                };

                let progress_sink = sink.clone();
                let progress_emit: ProgressEmit = Arc::new(move |text: String| {
                    let _ = progress_sink.try_send(RunEvent::WorkerProgress { worker_id, text });
                });

                let deps = WorkerDeps {
                    generator: gen,
                    deadline,
                    cancellation: worker_cancel.clone(),
                };

                let result = run_with_deadline(
                    worker_id,
                    deadline,
                    worker_cancel,
                    worker.run(&query, evidence.as_ref(), progress_emit, &deps),
                )
                .await;

                let summary = one_line_summary(&result);
                let _ = sink.send(RunEvent::WorkerCompleted { worker_id, summary }).await;

                (worker_id, result)
            });

            abort_handles.push(handle.abort_handle());
            in_flight.push(handle);
        }

        let overall_deadline_at = tokio::time::Instant::now() + self.overall_deadline;
        let mut deadline_hit = false;
        let mut grace_deadline_at: Option<tokio::time::Instant> = None;

        while !in_flight.is_empty() {
            tokio::select! {
                joined = in_flight.next() => {
                    if let Some(Ok((worker_id, result))) = joined {
                        results.insert(worker_id, result);
                    }
                }
                _ = tokio::time::sleep_until(overall_deadline_at), if !deadline_hit => {
                    warn!("run exceeded overall deadline, requesting cancellation");
                    deadline_hit = true;
                    cancellation.cancel();
                    grace_deadline_at = Some(tokio::time::Instant::now() + self.grace_window);
                }
                _ = wait_optional(grace_deadline_at), if deadline_hit => {
                    warn!("grace window elapsed, aborting stragglers");
                    for h in &abort_handles {
                        h.abort();
                    }
                    break;
                }
            }
        }

        for worker_id in selected {
            results.entry(*worker_id).or_insert_with(|| {
                WorkerResult::error(*worker_id, WorkerErrorKind::Timeout, "worker did not return within the grace window", 0)
            });
        }

        selected
            .iter()
            .filter_map(|id| results.remove(id))
            .collect()
    }
}

async fn wait_optional(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}

fn one_line_summary(result: &WorkerResult) -> String {
    use vg_domain::WorkerStatus;
    match result.status {
        WorkerStatus::Ok => {
            let first_line = result.output_text.lines().next().unwrap_or("");
            truncate(first_line, 120)
        }
        WorkerStatus::Error => format!("error: {}", truncate(&result.output_text, 120)),
        WorkerStatus::Skipped => "skipped".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use vg_domain::WorkerStatus;
    use vg_ports::GeneratorError;

    struct StubGenerator;

    impl Generator for StubGenerator {
        async fn generate(&self, _prompt: &str, _model_id: &str) -> Result<String, GeneratorError> {
            Ok("stub output".to_string())
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _model_id: &str,
        ) -> Result<futures::stream::BoxStream<'static, Result<String, GeneratorError>>, GeneratorError> {
            unimplemented!("not used in executor tests")
        }

        async fn embed(&self, _text: &str, _model_id: &str) -> Result<Vec<f32>, GeneratorError> {
            unimplemented!("not used in executor tests")
        }
    }

    struct InstantWorker(WorkerId);

    impl Worker<StubGenerator> for InstantWorker {
        fn id(&self) -> WorkerId {
            self.0
        }

        fn requires_evidence(&self) -> bool {
            false
        }

        fn run<'a>(
            &'a self,
            _query_text: &'a str,
            _fused_evidence: Option<&'a FusedEvidence>,
            _progress_emit: ProgressEmit,
            _deps: &'a WorkerDeps<StubGenerator>,
        ) -> Pin<Box<dyn Future<Output = WorkerResult> + Send + 'a>> {
            let id = self.0;
            Box::pin(async move {
                WorkerResult {
                    worker_id: id,
                    status: WorkerStatus::Ok,
                    output_text: format!("done: {id}"),
                    structured_output: Default::default(),
                    artifacts: Vec::new(),
                    duration_ms: 0,
                    evidence_used: None,
                }
            })
        }
    }

    #[tokio::test]
    async fn canonical_ordering_independent_of_completion_order() {
        let mut registry: HashMap<WorkerId, RegisteredWorker<StubGenerator>> = HashMap::new();
        registry.insert(
            WorkerId::Geo,
            RegisteredWorker {
                worker: Arc::new(InstantWorker(WorkerId::Geo)),
                deadline: Duration::from_secs(5),
            },
        );
        registry.insert(
            WorkerId::Analyst,
            RegisteredWorker {
                worker: Arc::new(InstantWorker(WorkerId::Analyst)),
                deadline: Duration::from_secs(5),
            },
        );

        let executor = Executor::new(3, Duration::from_secs(5), Duration::from_secs(1));
        let selected = vec![WorkerId::Analyst, WorkerId::Geo];
        let (tx, mut rx) = mpsc::channel(64);
        let cancellation = CancellationToken::new();

        let results = executor
            .execute(&selected, &registry, "query", None, Arc::new(StubGenerator), cancellation, tx)
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].worker_id, WorkerId::Analyst);
        assert_eq!(results[1].worker_id, WorkerId::Geo);

        let mut started = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RunEvent::WorkerStarted { worker_id } = event {
                started.push(worker_id);
            }
        }
        assert_eq!(started, vec![WorkerId::Analyst, WorkerId::Geo]);
    }

    #[tokio::test]
    async fn missing_registration_yields_skipped() {
        let registry: HashMap<WorkerId, RegisteredWorker<StubGenerator>> = HashMap::new();
        let executor = Executor::new(1, Duration::from_secs(5), Duration::from_secs(1));
        let selected = vec![WorkerId::Code];
        let (tx, _rx) = mpsc::channel(16);

        let results = executor
            .execute(&selected, &registry, "query", None, Arc::new(StubGenerator), CancellationToken::new(), tx)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, WorkerStatus::Skipped);
    }
}
