//! Worker identity and task classification.

use serde::{Deserialize, Serialize};

/// Stable symbolic identifier for a specialist worker.
///
/// Workers are a closed set known at compile time; unlike `CorpusId` this is
/// not an open vocabulary, since the Router's cue table (§4.5) and the
/// Executor's canonical ordering (§4.5/§4.6) both need to reason over the
/// whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerId {
    Search,
    Analyst,
    Geo,
    Code,
    Redactor,
    Reflection,
}

impl WorkerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerId::Search => "search",
            WorkerId::Analyst => "analyst",
            WorkerId::Geo => "geo",
            WorkerId::Code => "code",
            WorkerId::Redactor => "redactor",
            WorkerId::Reflection => "reflection",
        }
    }

    /// Fixed canonical ordering used for `WorkerResult` lists and
    /// `worker_started` dispatch order (resolves Open Question 1).
    pub const CANONICAL_ORDER: [WorkerId; 5] = [
        WorkerId::Analyst,
        WorkerId::Geo,
        WorkerId::Search,
        WorkerId::Code,
        WorkerId::Redactor,
    ];

    /// Sort a set of selected workers into canonical order.
    pub fn sort_canonical(workers: &mut [WorkerId]) {
        workers.sort_by_key(|w| {
            WorkerId::CANONICAL_ORDER
                .iter()
                .position(|c| c == w)
                .unwrap_or(usize::MAX)
        });
    }

    /// Parse a snake_case worker name, returning `None` for anything outside
    /// the closed set rather than erroring — used by Reflection (§4.8) to
    /// drop unknown worker ids from an external response instead of failing
    /// the whole parse.
    pub fn from_str_lossy(s: &str) -> Option<WorkerId> {
        match s {
            "search" => Some(WorkerId::Search),
            "analyst" => Some(WorkerId::Analyst),
            "geo" => Some(WorkerId::Geo),
            "code" => Some(WorkerId::Code),
            "redactor" => Some(WorkerId::Redactor),
            "reflection" => Some(WorkerId::Reflection),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of the overall task implied by the selected worker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Search,
    Analyze,
    Geospatial,
    Code,
    Summarize,
    Compound,
}

impl TaskKind {
    /// `compound` iff more than one worker was selected; otherwise the task
    /// kind mirrors the single selected worker.
    pub fn from_selected(workers: &[WorkerId]) -> Self {
        if workers.len() > 1 {
            return TaskKind::Compound;
        }
        match workers.first() {
            Some(WorkerId::Search) => TaskKind::Search,
            Some(WorkerId::Analyst) => TaskKind::Analyze,
            Some(WorkerId::Geo) => TaskKind::Geospatial,
            Some(WorkerId::Code) => TaskKind::Code,
            Some(WorkerId::Redactor) => TaskKind::Summarize,
            Some(WorkerId::Reflection) | None => TaskKind::Analyze,
        }
    }
}
