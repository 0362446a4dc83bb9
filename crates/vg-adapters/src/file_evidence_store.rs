//! File-backed Evidence Store adapter (C1).
//!
//! Grounded on the manifest/content-hash discipline of the evidence-manifest
//! builder this lineage already carries, adapted from a write-once content
//! store to a read-oriented per-corpus vector index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use vg_domain::{CorpusId, CorpusInfo, EvidenceRecord};
use vg_ports::{EvidenceStoreError, Generator};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorpusManifest {
    reliability_weight: f64,
    #[serde(default)]
    tags: std::collections::BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexedRecord {
    #[serde(flatten)]
    record: EvidenceRecord,
    embedding: Vec<f32>,
}

struct Corpus {
    info: CorpusInfo,
    records: Vec<IndexedRecord>,
}

/// Loads `data/vector_index/<corpus_id>/{manifest.json,records.jsonl}` once
/// at startup and serves `retrieve` out of memory, embedding the query
/// through the injected `Generator` on every call (§4.1's design: "the
/// store holds an injected embedder").
pub struct FileEvidenceStore<G: Generator> {
    generator: Arc<G>,
    embedding_model_id: String,
    timeout: Duration,
    corpora: HashMap<CorpusId, Corpus>,
}

impl<G: Generator> FileEvidenceStore<G> {
    /// Load every subdirectory of `base_dir` as a corpus. Missing or
    /// malformed corpus directories are skipped with a warning rather than
    /// failing startup, matching §4.1's "corpus missing -> CorpusUnavailable
    /// at query time, not at load time" failure model.
    pub fn load(base_dir: &Path, generator: Arc<G>, embedding_model_id: impl Into<String>, timeout: Duration) -> Self {
        let mut corpora = HashMap::new();

        let entries = match std::fs::read_dir(base_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %base_dir.display(), "vector index directory missing; starting with no corpora");
                return Self {
                    generator,
                    embedding_model_id: embedding_model_id.into(),
                    timeout,
                    corpora,
                };
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let corpus_id = CorpusId::new(entry.file_name().to_string_lossy().to_string());
            match load_corpus(&path, &corpus_id) {
                Ok(corpus) => {
                    corpora.insert(corpus_id, corpus);
                }
                Err(e) => {
                    warn!(corpus_id = %corpus_id, error = %e, "failed to load corpus, skipping");
                }
            }
        }

        Self {
            generator,
            embedding_model_id: embedding_model_id.into(),
            timeout,
            corpora,
        }
    }
}

fn load_corpus(path: &PathBuf, corpus_id: &CorpusId) -> Result<Corpus, std::io::Error> {
    let manifest_raw = std::fs::read_to_string(path.join("manifest.json"))?;
    let manifest: CorpusManifest = serde_json::from_str(&manifest_raw)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let records_raw = std::fs::read_to_string(path.join("records.jsonl")).unwrap_or_default();
    let mut records = Vec::new();
    for (i, line) in records_raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<IndexedRecord>(line) {
            Ok(r) => records.push(r),
            Err(e) => warn!(corpus_id = %corpus_id, line = i, error = %e, "dropping malformed evidence record"),
        }
    }

    Ok(Corpus {
        info: CorpusInfo {
            corpus_id: corpus_id.clone(),
            reliability_weight: manifest.reliability_weight,
            tags: manifest.tags,
        },
        records,
    })
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

impl<G: Generator> vg_ports::EvidenceStore for FileEvidenceStore<G> {
    #[instrument(skip(self), fields(corpus_id = %corpus_id))]
    async fn retrieve(
        &self,
        query_text: &str,
        corpus_id: &CorpusId,
        top_k: usize,
        strict: bool,
    ) -> Result<Vec<EvidenceRecord>, EvidenceStoreError> {
        let corpus = self.corpora.get(corpus_id).ok_or_else(|| EvidenceStoreError::CorpusUnavailable {
            corpus_id: corpus_id.as_str().to_string(),
        })?;

        let embed = self.generator.embed(query_text, &self.embedding_model_id);
        let query_embedding = match tokio::time::timeout(self.timeout, embed).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                if strict {
                    return Err(EvidenceStoreError::Timeout {
                        corpus_id: corpus_id.as_str().to_string(),
                    });
                }
                warn!(corpus_id = %corpus_id, error = %e, "embedder unavailable, returning empty retrieval");
                return Ok(Vec::new());
            }
            Err(_) => {
                if strict {
                    return Err(EvidenceStoreError::Timeout {
                        corpus_id: corpus_id.as_str().to_string(),
                    });
                }
                warn!(corpus_id = %corpus_id, "embedder timeout, returning empty retrieval");
                return Ok(Vec::new());
            }
        };

        let mut scored: Vec<(f64, &IndexedRecord)> = corpus
            .records
            .iter()
            .map(|r| (cosine_similarity(&query_embedding, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, r)| {
                let mut record = r.record.clone();
                record.similarity_score = score;
                record
            })
            .collect())
    }

    async fn list_corpora(&self) -> Result<Vec<CorpusInfo>, EvidenceStoreError> {
        Ok(self.corpora.values().map(|c| c.info.clone()).collect())
    }
}
