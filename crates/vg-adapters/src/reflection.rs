//! Reflection & Adaptive Re-run Loop (C8): score a synthesis, detect
//! contradictions, decide whether to re-run a subset of workers.
//!
//! Grounded on the Reflection worker's own `generate` invocation pattern
//! (`workers/reflection_worker.rs`) for the generation call, and on
//! `sr-adapters/src/governor.rs`'s decision-then-loop shape for the
//! iterate-until-confident control flow, generalized to the fixed two-pass
//! budget specified in §4.8.
//!
//! `reflect` dispatches through `ReflectionWorker` via `run_with_deadline` so
//! the reflection call honors the same deadline/cancellation discipline
//! every other worker does under the Worker Contract (§4.4) — reflection is
//! one of the closed `WorkerId` set, it just never goes through the
//! Router/Executor's selection path.

use std::sync::Arc;
use std::time::Duration;

use vg_domain::{ConsistencyCheck, Reflection, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{run_with_deadline, CancellationToken, WorkerDeps};
use crate::workers::ReflectionWorker;
use crate::worker::Worker;

/// Reflection terminates once confidence reaches this floor.
pub const CONFIDENCE_FLOOR: f64 = 0.7;

/// Fixed iteration budget (§4.8); not configurable.
pub const MAX_ITER: u32 = 2;

/// Raw JSON shape the reflection worker is asked to produce. Kept separate
/// from `vg_domain::Reflection` so malformed/partial responses can be
/// coerced field-by-field rather than failing the whole parse.
#[derive(Debug, Default, serde::Deserialize)]
struct RawReflection {
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    contradictions: Vec<String>,
    #[serde(default)]
    rerun: Vec<String>,
    consistency_check: Option<RawConsistency>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawConsistency {
    #[serde(default)]
    overall_stability: String,
    #[serde(default)]
    contradictions: Vec<String>,
    #[serde(default)]
    alignment_summary: String,
}

fn build_prompt(query: &str, worker_results: &[WorkerResult], synthesis_text: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Evaluate the following intelligence brief for internal consistency. Respond with a \
         single JSON object with keys: confidence (number 0..1), contradictions (array of \
         strings referencing worker ids), rerun (array of worker ids whose output was \
         insufficient), consistency_check ({overall_stability, contradictions, \
         alignment_summary}).\n\n",
    );
    prompt.push_str(&format!("Query: {query}\n\n"));
    prompt.push_str("Worker outputs:\n");
    for result in worker_results {
        prompt.push_str(&format!("[{}] {}\n", result.worker_id, result.output_text));
    }
    prompt.push_str("\nSynthesized brief:\n");
    prompt.push_str(synthesis_text);
    prompt
}

/// Parse a reflection worker's raw text response into the domain
/// `Reflection`, coercing invalid fields per §4.8 point 2: non-numeric or
/// out-of-range confidence defaults to 0.5, unknown worker ids are dropped.
fn parse_reflection(raw_text: &str) -> Reflection {
    let parsed: RawReflection = serde_json::from_str(raw_text).unwrap_or_default();

    let confidence = parsed
        .confidence
        .as_ref()
        .and_then(|v| v.as_f64())
        .filter(|c| (0.0..=1.0).contains(c))
        .unwrap_or(0.5);

    let rerun = parsed
        .rerun
        .iter()
        .filter_map(|raw_id| WorkerId::from_str_lossy(raw_id))
        .collect::<Vec<_>>();

    let consistency_check = parsed
        .consistency_check
        .map(|c| ConsistencyCheck {
            overall_stability: c.overall_stability,
            contradictions: c.contradictions,
            alignment_summary: c.alignment_summary,
        })
        .unwrap_or_default();

    Reflection {
        confidence,
        contradictions: parsed.contradictions,
        rerun,
        consistency_check,
        review_notes: String::new(),
    }
}

/// Score `synthesis_text` by invoking the reflection worker with a
/// structured prompt and parsing its response. Returns a degraded
/// `Reflection` rather than an error if the worker is unavailable or
/// exceeds `deadline` (§4.8 fatal condition): the run continues, but
/// `confidence = 0.0` so the caller's decision logic terminates the loop.
pub async fn reflect<G: Generator + 'static>(
    generator: Arc<G>,
    model_id: &str,
    query: &str,
    worker_results: &[WorkerResult],
    synthesis_text: &str,
    deadline: Duration,
    cancellation: CancellationToken,
) -> Reflection {
    let prompt = build_prompt(query, worker_results, synthesis_text);

    let worker = ReflectionWorker { model_id: model_id.to_string() };
    let deps = WorkerDeps { generator, deadline, cancellation: cancellation.clone() };
    let progress_emit = Arc::new(|_: String| {});

    let result = run_with_deadline(WorkerId::Reflection, deadline, cancellation, worker.run(&prompt, None, progress_emit, &deps)).await;

    match result.status {
        WorkerStatus::Ok => parse_reflection(&result.output_text),
        _ => Reflection::degraded(&result.output_text),
    }
}

/// Whether the adaptive re-run loop should continue past `current`, given
/// `iteration_count` (1-indexed: the iteration just completed) and the
/// re-run set from the previous iteration (`None` on the first pass).
///
/// Per §4.8 point 3: terminate once confidence clears the floor or the
/// iteration budget is exhausted; otherwise continue only if this
/// iteration's re-run set is non-empty and strictly smaller than the
/// previous one (monotonically shrinking, guaranteeing termination).
pub fn should_rerun(current: &Reflection, iteration_count: u32, previous_rerun_len: Option<usize>) -> bool {
    if current.confidence >= CONFIDENCE_FLOOR || iteration_count >= MAX_ITER {
        return false;
    }
    if current.rerun.is_empty() {
        return false;
    }
    match previous_rerun_len {
        Some(prev_len) => current.rerun.len() < prev_len,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json() {
        let raw = r#"{"confidence": 0.82, "contradictions": ["geo vs analyst"], "rerun": ["geo"], "consistency_check": {"overall_stability": "stable", "contradictions": [], "alignment_summary": "aligned"}}"#;
        let reflection = parse_reflection(raw);
        assert_eq!(reflection.confidence, 0.82);
        assert_eq!(reflection.rerun, vec![WorkerId::Geo]);
        assert_eq!(reflection.consistency_check.overall_stability, "stable");
    }

    #[test]
    fn coerces_invalid_confidence_and_drops_unknown_ids() {
        let raw = r#"{"confidence": "high", "rerun": ["geo", "not_a_worker"]}"#;
        let reflection = parse_reflection(raw);
        assert_eq!(reflection.confidence, 0.5);
        assert_eq!(reflection.rerun, vec![WorkerId::Geo]);
    }

    #[test]
    fn unparseable_response_yields_default_confidence() {
        let reflection = parse_reflection("not json at all");
        assert_eq!(reflection.confidence, 0.5);
        assert!(reflection.rerun.is_empty());
    }

    #[test]
    fn terminates_once_confidence_floor_cleared() {
        let reflection = Reflection {
            confidence: 0.9,
            contradictions: Vec::new(),
            rerun: vec![WorkerId::Geo],
            consistency_check: ConsistencyCheck::default(),
            review_notes: String::new(),
        };
        assert!(!should_rerun(&reflection, 1, None));
    }

    #[test]
    fn terminates_at_max_iter_even_with_low_confidence() {
        let reflection = Reflection {
            confidence: 0.2,
            contradictions: Vec::new(),
            rerun: vec![WorkerId::Geo],
            consistency_check: ConsistencyCheck::default(),
            review_notes: String::new(),
        };
        assert!(!should_rerun(&reflection, MAX_ITER, None));
    }

    #[test]
    fn continues_when_rerun_set_shrinks() {
        let reflection = Reflection {
            confidence: 0.3,
            contradictions: Vec::new(),
            rerun: vec![WorkerId::Geo],
            consistency_check: ConsistencyCheck::default(),
            review_notes: String::new(),
        };
        assert!(should_rerun(&reflection, 1, Some(2)));
    }

    #[test]
    fn stops_when_rerun_set_does_not_shrink() {
        let reflection = Reflection {
            confidence: 0.3,
            contradictions: Vec::new(),
            rerun: vec![WorkerId::Geo, WorkerId::Analyst],
            consistency_check: ConsistencyCheck::default(),
            review_notes: String::new(),
        };
        assert!(!should_rerun(&reflection, 1, Some(2)));
    }

    enum StubResponse {
        Text(String),
        Unavailable,
    }

    struct StubGenerator {
        response: StubResponse,
    }

    impl Generator for StubGenerator {
        async fn generate(&self, _prompt: &str, _model_id: &str) -> Result<String, vg_ports::GeneratorError> {
            match &self.response {
                StubResponse::Text(text) => Ok(text.clone()),
                StubResponse::Unavailable => Err(vg_ports::GeneratorError::Unavailable { message: "down".to_string() }),
            }
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _model_id: &str,
        ) -> Result<futures::stream::BoxStream<'static, Result<String, vg_ports::GeneratorError>>, vg_ports::GeneratorError> {
            unimplemented!("not exercised in reflection tests")
        }

        async fn embed(&self, _text: &str, _model_id: &str) -> Result<Vec<f32>, vg_ports::GeneratorError> {
            unimplemented!("not exercised in reflection tests")
        }
    }

    #[tokio::test]
    async fn reflect_parses_successful_generation() {
        let raw = r#"{"confidence": 0.9, "rerun": []}"#;
        let generator = Arc::new(StubGenerator { response: StubResponse::Text(raw.to_string()) });
        let reflection = reflect(
            generator,
            "reflection-model",
            "query",
            &[],
            "brief",
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reflection.confidence, 0.9);
    }

    #[tokio::test]
    async fn reflect_degrades_when_generator_unavailable() {
        let generator = Arc::new(StubGenerator { response: StubResponse::Unavailable });
        let reflection = reflect(
            generator,
            "reflection-model",
            "query",
            &[],
            "brief",
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reflection.confidence, 0.0);
        assert!(reflection.review_notes.contains("unavailable"));
    }
}
