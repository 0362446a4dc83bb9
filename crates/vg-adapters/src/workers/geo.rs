//! `geo` worker: extracts geographic entities from fused evidence and
//! writes a placeholder map artifact. The real geospatial clustering math
//! and map renderer are out of scope per the platform's purpose statement;
//! this worker only needs to honor the Worker Contract and produce a
//! structured place→mentions map plus an artifact reference.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use regex::Regex;
use vg_domain::{FusedEvidence, WorkerId, WorkerResult, WorkerStatus};
use vg_ports::Generator;

use crate::worker::{ProgressEmit, Worker, WorkerDeps};

pub struct GeoWorker {
    pub model_id: String,
    pub maps_dir: std::path::PathBuf,
}

fn extract_places(text: &str, lexicon: &[&str]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let lower = text.to_lowercase();
    for place in lexicon {
        let re = Regex::new(&format!(r"\b{}\b", regex::escape(place))).unwrap();
        let count = re.find_iter(&lower).count();
        if count > 0 {
            counts.insert(place.to_string(), count);
        }
    }
    counts
}

const PLACE_LEXICON: &[&str] = &[
    "sudan", "ukraine", "syria", "yemen", "somalia", "myanmar", "darfur", "kharkiv", "khartoum",
];

impl<G: Generator> Worker<G> for GeoWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Geo
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
            progress_emit("extracting geographic entities\n".to_string());

            let mut mentions: BTreeMap<String, usize> = BTreeMap::new();
            mentions.extend(extract_places(query_text, PLACE_LEXICON));
            if let Some(fe) = fused_evidence {
                for record in &fe.records {
                    for (place, count) in extract_places(&record.text, PLACE_LEXICON) {
                        *mentions.entry(place).or_insert(0) += count;
                    }
                }
            }

            let evidence_text = fused_evidence
                .map(|fe| {
                    fe.records
                        .iter()
                        .take(10)
                        .map(|r| r.text.clone())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();

            let prompt = format!(
                "Summarize the geographic hotspots implied by the following query and \
                 evidence, referencing place names explicitly.\n\nQuery: {query_text}\n\n\
                 Evidence:\n{evidence_text}\n\nDetected mentions: {mentions:?}"
            );

            progress_emit("rendering map artifact\n".to_string());
            let artifact_path = self.maps_dir.join(format!("geo_{}.html", ulid::Ulid::new()));
            let artifact_written = std::fs::create_dir_all(&self.maps_dir)
                .and_then(|_| std::fs::write(&artifact_path, render_placeholder_map(&mentions)))
                .is_ok();

            let mut structured_output = serde_json::Map::new();
            structured_output.insert(
                "mentions".to_string(),
                serde_json::to_value(&mentions).unwrap_or_default(),
            );

            match deps.generator.generate(&prompt, &self.model_id).await {
                Ok(text) => WorkerResult {
                    worker_id: WorkerId::Geo,
                    status: WorkerStatus::Ok,
                    output_text: text,
                    structured_output,
                    artifacts: if artifact_written {
                        vec![artifact_path.display().to_string()]
                    } else {
                        Vec::new()
                    },
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence_used: fused_evidence.cloned(),
                },
                Err(e) => WorkerResult::error(
                    WorkerId::Geo,
                    vg_domain::WorkerErrorKind::GenerationUnavailable,
                    &e.to_string(),
                    start.elapsed().as_millis() as u64,
                ),
            }
        })
    }
}

fn render_placeholder_map(mentions: &BTreeMap<String, usize>) -> String {
    let rows: String = mentions
        .iter()
        .map(|(place, count)| format!("<li>{place}: {count}</li>"))
        .collect();
    format!("<html><body><h1>Geographic mentions</h1><ul>{rows}</ul></body></html>")
}
