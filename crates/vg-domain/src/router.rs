//! Router / Intent Classifier (C5): maps a query to a worker set + task kind.

use crate::worker::{TaskKind, WorkerId};

struct Cue {
    keywords: &'static [&'static str],
    worker: WorkerId,
}

const CUES: &[Cue] = &[
    Cue {
        // Geographic terms: a small representative lexicon of
        // country/region names and geographic nouns.
        keywords: &[
            "sudan", "ukraine", "syria", "yemen", "somalia", "myanmar", "region",
            "country", "border", "province", "city",
        ],
        worker: WorkerId::Geo,
    },
    Cue {
        keywords: &[
            "analyze", "analyse", "assess", "trend", "impact", "conflict", "escalation",
            "hotspot",
        ],
        worker: WorkerId::Analyst,
    },
    Cue {
        keywords: &["today", "latest", "news", "recent", "breaking"],
        worker: WorkerId::Search,
    },
    Cue {
        keywords: &["compute", "plot", "table of", "calculate", "chart"],
        worker: WorkerId::Code,
    },
    Cue {
        keywords: &["brief", "executive summary", "summarize", "summarise", "tl;dr"],
        worker: WorkerId::Redactor,
    },
];

/// Result of the Router's `select` operation.
#[derive(Debug, Clone)]
pub struct RouterSelection {
    pub task_kind: TaskKind,
    pub selected_workers: Vec<WorkerId>,
}

/// Map `query_text` to `{ task_kind, selected_workers }` per §4.5.
///
/// Deterministic: a bag-of-keywords cue table unioned across matches, falling
/// back to `{analyst}` when nothing matches. Results are always returned in
/// canonical order (`WorkerId::CANONICAL_ORDER`), independent of cue order.
pub fn select(query_text: &str) -> RouterSelection {
    let query_lower = query_text.to_lowercase();

    let mut selected: Vec<WorkerId> = CUES
        .iter()
        .filter(|cue| cue.keywords.iter().any(|kw| query_lower.contains(kw)))
        .map(|cue| cue.worker)
        .collect();

    selected.sort();
    selected.dedup();

    if selected.is_empty() {
        selected.push(WorkerId::Analyst);
    }

    WorkerId::sort_canonical(&mut selected);

    RouterSelection {
        task_kind: TaskKind::from_selected(&selected),
        selected_workers: selected,
    }
}
