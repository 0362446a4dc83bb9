//! Evidence records and the Context Fusion algorithm (C2).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::{CorpusId, Framework};

/// A single retrieved snippet from one corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub corpus_id: CorpusId,
    pub text: String,
    pub similarity_score: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EvidenceRecord {
    pub fn weighted_score(&self, reliability_weight: f64) -> f64 {
        self.similarity_score * reliability_weight
    }

    /// Content fingerprint used for dedup: normalized whitespace, lowercased,
    /// truncated to 256 characters (Open Question 4, fixed per DESIGN.md).
    pub fn fingerprint(&self) -> String {
        const PREFIX_LEN: usize = 256;
        let normalized: String = self
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        normalized.chars().take(PREFIX_LEN).collect()
    }
}

/// A ranked, deduplicated, weighted merge of evidence retrieved from
/// multiple corpora.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedEvidence {
    pub records: Vec<EvidenceRecord>,
    pub ratio: BTreeMap<String, usize>,
    pub framework: Framework,
}

impl FusedEvidence {
    pub fn empty(framework: Framework) -> Self {
        Self {
            records: Vec::new(),
            ratio: BTreeMap::new(),
            framework,
        }
    }
}

/// Combine per-corpus retrievals into a single ranked `FusedEvidence`,
/// per §4.2.
///
/// `reliability_weight` resolves a corpus id to its configured weight;
/// corpora absent from it fall back to a weight of 1.0 (only reachable if
/// the caller passes retrievals for a corpus the Orchestrator didn't know
/// about, which should not happen in practice).
pub fn fuse(
    retrievals: &BTreeMap<CorpusId, Vec<EvidenceRecord>>,
    reliability_weight: impl Fn(&CorpusId) -> f64,
    framework: Framework,
) -> FusedEvidence {
    // Insertion order matters for the documented tie-break, so walk
    // `retrievals` (a BTreeMap, already corpus_id-ascending) in order and
    // push records in the order they arrive within each corpus.
    struct Scored {
        record: EvidenceRecord,
        weighted_score: f64,
        insertion_index: usize,
    }

    let mut best_by_fingerprint: BTreeMap<String, Scored> = BTreeMap::new();
    let mut insertion_index = 0usize;

    for (corpus_id, records) in retrievals.iter() {
        let weight = reliability_weight(corpus_id);
        for record in records {
            let weighted_score = record.weighted_score(weight);
            let fingerprint = record.fingerprint();
            let candidate = Scored {
                record: record.clone(),
                weighted_score,
                insertion_index,
            };
            insertion_index += 1;

            match best_by_fingerprint.get(&fingerprint) {
                Some(existing) if existing.weighted_score >= weighted_score => {}
                _ => {
                    best_by_fingerprint.insert(fingerprint, candidate);
                }
            }
        }
    }

    let mut survivors: Vec<Scored> = best_by_fingerprint.into_values().collect();
    survivors.sort_by(|a, b| {
        b.weighted_score
            .partial_cmp(&a.weighted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.corpus_id.cmp(&b.record.corpus_id))
            .then_with(|| a.insertion_index.cmp(&b.insertion_index))
    });

    let mut ratio: BTreeMap<String, usize> = BTreeMap::new();
    for s in &survivors {
        *ratio.entry(s.record.corpus_id.as_str().to_string()).or_insert(0) += 1;
    }

    FusedEvidence {
        records: survivors.into_iter().map(|s| s.record).collect(),
        ratio,
        framework,
    }
}
