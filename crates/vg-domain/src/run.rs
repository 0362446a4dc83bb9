//! Run-scoped entities: WorkerResult, Reflection, RunRecord, RunEvent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::corpus::Framework;
use crate::evidence::FusedEvidence;
use crate::worker::{TaskKind, WorkerId};

/// Run identifier: `run_<ULID>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(format!("run_{}", Ulid::new()))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome status of a single worker invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Ok,
    Error,
    Skipped,
}

/// Sub-kind of a `WorkerStatus::Error`, carried in `structured_output` under
/// the `"error_kind"` key rather than as a separate field, to keep
/// `WorkerResult` stable as new error kinds are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerErrorKind {
    Timeout,
    Cancelled,
    GenerationUnavailable,
    Internal,
}

/// The result of one worker's invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    pub output_text: String,
    #[serde(default)]
    pub structured_output: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_used: Option<FusedEvidence>,
}

impl WorkerResult {
    pub fn skipped(worker_id: WorkerId, reason: &str) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Skipped,
            output_text: String::new(),
            structured_output: serde_json::Map::from_iter([(
                "reason".to_string(),
                serde_json::Value::String(reason.to_string()),
            )]),
            artifacts: Vec::new(),
            duration_ms: 0,
            evidence_used: None,
        }
    }

    pub fn error(worker_id: WorkerId, kind: WorkerErrorKind, message: &str, duration_ms: u64) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Error,
            output_text: message.to_string(),
            structured_output: serde_json::Map::from_iter([(
                "error_kind".to_string(),
                serde_json::Value::String(format!("{kind:?}").to_lowercase()),
            )]),
            artifacts: Vec::new(),
            duration_ms,
            evidence_used: None,
        }
    }
}

/// A structural-vs-event consistency check produced by Reflection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub overall_stability: String,
    #[serde(default)]
    pub contradictions: Vec<String>,
    pub alignment_summary: String,
}

/// Meta-evaluation of a synthesis, produced by the Reflection worker (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub confidence: f64,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default)]
    pub rerun: Vec<WorkerId>,
    pub consistency_check: ConsistencyCheck,
    #[serde(default)]
    pub review_notes: String,
}

impl Reflection {
    /// Degraded reflection used when the reflection worker is unavailable
    /// (§4.8 fatal condition): the run is not failed, but confidence floors
    /// to zero and no re-run is requested.
    pub fn degraded(reason: &str) -> Self {
        Self {
            confidence: 0.0,
            contradictions: Vec::new(),
            rerun: Vec::new(),
            consistency_check: ConsistencyCheck::default(),
            review_notes: format!("reflection worker unavailable: {reason}"),
        }
    }
}

/// A persisted, append-only record of one end-to-end run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub query: String,
    pub task_kind: TaskKind,
    pub selected_workers: Vec<WorkerId>,
    pub framework: Framework,
    pub worker_results: Vec<WorkerResult>,
    pub synthesis_text: String,
    pub reflection: Reflection,
    pub iteration_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The kind of a terminal stream error, mirroring the error taxonomy (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GenerationUnavailable,
    RunDeadlineExceeded,
    Internal,
}

/// Streaming event emitted throughout a run's lifecycle (§3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    WorkerStarted { worker_id: WorkerId },
    WorkerProgress { worker_id: WorkerId, text: String },
    WorkerCompleted { worker_id: WorkerId, summary: String },
    Phase { name: String },
    SynthesisDelta { text: String },
    Reflection { reflection: Reflection },
    Done,
    Error { kind: ErrorKind, message: String },
}

impl RunEvent {
    /// Whether this event is allowed to terminate the stream (invariant 6).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Done | RunEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(RunEvent::Done.is_terminal());
        assert!(RunEvent::Error {
            kind: ErrorKind::Internal,
            message: "x".into()
        }
        .is_terminal());
        assert!(!RunEvent::Phase { name: "synthesis".into() }.is_terminal());
    }
}
