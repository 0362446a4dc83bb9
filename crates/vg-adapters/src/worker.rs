//! Worker Contract (C4): the uniform invocation surface every specialist
//! worker implements.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use vg_domain::{FusedEvidence, WorkerErrorKind, WorkerId, WorkerResult};
use vg_ports::Generator;

pub use tokio_util::sync::CancellationToken;

/// Non-blocking progress callback a worker may invoke zero or more times.
pub type ProgressEmit = Arc<dyn Fn(String) + Send + Sync>;

/// Shared dependencies every concrete worker needs: the generation
/// interface and a deadline/cancellation pair.
pub struct WorkerDeps<G: Generator> {
    pub generator: Arc<G>,
    pub deadline: Duration,
    pub cancellation: CancellationToken,
}

/// Uniform surface over heterogeneous specialist workers, per §4.4.
///
/// `run` returns a boxed future rather than `impl Future` (RPITIT) because
/// the Executor holds a `Vec<Box<dyn Worker<G>>>` of heterogeneous worker
/// kinds — a collection RPITIT methods cannot support since they are not
/// object-safe. Individual worker impls still write plain `async fn`; the
/// boxing happens once, at the `WorkerExt::run_boxed` blanket impl below.
pub trait Worker<G: Generator>: Send + Sync {
    fn id(&self) -> WorkerId;

    /// If true, the Executor passes `Some(fused_evidence)`; if false, `None`.
    fn requires_evidence(&self) -> bool;

    fn run<'a>(
        &'a self,
        query_text: &'a str,
        fused_evidence: Option<&'a FusedEvidence>,
        progress_emit: ProgressEmit,
        deps: &'a WorkerDeps<G>,
    ) -> Pin<Box<dyn Future<Output = WorkerResult> + Send + 'a>>;
}

/// Race a worker's future against its deadline and the shared cancellation
/// token, producing a `status=error` `WorkerResult` on either.
pub async fn run_with_deadline<F>(
    worker_id: WorkerId,
    deadline: Duration,
    cancellation: CancellationToken,
    fut: F,
) -> WorkerResult
where
    F: Future<Output = WorkerResult> + Send,
{
    let start = std::time::Instant::now();
    tokio::select! {
        result = fut => result,
        _ = tokio::time::sleep(deadline) => {
            WorkerResult::error(worker_id, WorkerErrorKind::Timeout, "worker exceeded its deadline", start.elapsed().as_millis() as u64)
        }
        _ = cancellation.cancelled() => {
            WorkerResult::error(worker_id, WorkerErrorKind::Cancelled, "run was cancelled", start.elapsed().as_millis() as u64)
        }
    }
}
