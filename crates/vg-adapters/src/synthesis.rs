//! Synthesis Stage (C7): combine worker outputs and fused evidence into the
//! final brief, streamed token-by-token.
//!
//! Grounded on the synthesis pipeline stage of
//! `other_examples/.../src-agent-orchestrator.rs.rs` (prompt assembly from
//! ranked findings, accumulation of a streamed response), adapted to the
//! `Generator` port's streaming contract.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::instrument;
use vg_domain::{Framework, FusedEvidence, RunEvent, WorkerResult};
use vg_ports::{Generator, GeneratorError};

/// Evidence is included in ranked order until this character budget is hit;
/// the cut point is always at a record boundary (§4.7).
const EVIDENCE_CHAR_BUDGET: usize = 8000;

/// Build the synthesis prompt: query, framework scaffold, condensed worker
/// outputs, and budget-truncated ranked evidence.
fn build_prompt(query: &str, fused_evidence: &FusedEvidence, worker_results: &[WorkerResult], framework: Framework) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are producing an intelligence brief. Ground every claim in the evidence and worker findings below.\n\n");
    prompt.push_str(&format!("Query: {query}\n\n"));

    let sections = framework.sections();
    if sections.is_empty() {
        prompt.push_str("Write a single free-prose brief addressing the query.\n\n");
    } else {
        prompt.push_str("Structure the brief under exactly these section headings, in order:\n");
        for section in sections {
            prompt.push_str(&format!("- {section}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str("Worker findings:\n");
    for result in worker_results {
        prompt.push_str(&format!(
            "[{}] ({:?}) {}\n",
            result.worker_id,
            result.status,
            condensed(&result.output_text, 500)
        ));
    }
    prompt.push('\n');

    prompt.push_str("Evidence (ranked by weighted relevance):\n");
    let mut used = 0usize;
    for record in &fused_evidence.records {
        let line = format!("- [{}] {}\n", record.corpus_id, record.text);
        if used + line.len() > EVIDENCE_CHAR_BUDGET && used > 0 {
            break;
        }
        used += line.len();
        prompt.push_str(&line);
    }

    prompt
}

fn condensed(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        format!("{}…", &text[..max])
    }
}

/// Produce the synthesis text, streaming each delta onto `token_sink` as a
/// `RunEvent::SynthesisDelta` and accumulating it into the returned string.
/// The returned string is byte-identical to the concatenation of the
/// deltas emitted (§4.7's fidelity requirement, P3).
#[instrument(skip(fused_evidence, worker_results, generator, token_sink))]
pub async fn synthesize<G: Generator>(
    query: &str,
    fused_evidence: &FusedEvidence,
    worker_results: &[WorkerResult],
    framework: Framework,
    generator: &G,
    model_id: &str,
    token_sink: &mpsc::Sender<RunEvent>,
) -> Result<String, GeneratorError> {
    let prompt = build_prompt(query, fused_evidence, worker_results, framework);

    let mut stream = generator.generate_stream(&prompt, model_id).await?;
    let mut accumulated = String::new();

    while let Some(chunk) = stream.next().await {
        let delta = chunk?;
        accumulated.push_str(&delta);
        let _ = token_sink.send(RunEvent::SynthesisDelta { text: delta }).await;
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vg_domain::{CorpusId, EvidenceRecord, WorkerId, WorkerStatus};

    fn record(corpus: &str, text: &str) -> EvidenceRecord {
        EvidenceRecord {
            corpus_id: CorpusId::new(corpus),
            text: text.to_string(),
            similarity_score: 0.9,
            metadata: Default::default(),
        }
    }

    #[test]
    fn prompt_includes_framework_sections() {
        let fused = FusedEvidence {
            records: vec![record("acled", "conflict escalation near Darfur")],
            ratio: Default::default(),
            framework: Framework::Pmesii,
        };
        let results = vec![WorkerResult {
            worker_id: WorkerId::Analyst,
            status: WorkerStatus::Ok,
            output_text: "trend analysis here".to_string(),
            structured_output: Default::default(),
            artifacts: Vec::new(),
            duration_ms: 10,
            evidence_used: None,
        }];
        let prompt = build_prompt("Sudan conflict", &fused, &results, Framework::Pmesii);
        for section in Framework::Pmesii.sections() {
            assert!(prompt.contains(section));
        }
        assert!(prompt.contains("trend analysis here"));
        assert!(prompt.contains("Darfur"));
    }

    #[test]
    fn prompt_truncates_evidence_at_record_boundary() {
        let long_text = "x".repeat(EVIDENCE_CHAR_BUDGET);
        let fused = FusedEvidence {
            records: vec![record("a", &long_text), record("b", "short tail record")],
            ratio: Default::default(),
            framework: Framework::None,
        };
        let prompt = build_prompt("q", &fused, &[], Framework::None);
        assert!(!prompt.contains("short tail record"));
    }
}
