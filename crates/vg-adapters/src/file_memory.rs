//! Collaboration Memory (C10): an append-only JSONL log of `RunRecord`s with
//! an in-memory secondary index rebuilt on startup.
//!
//! Grounded on `file_evidence_store.rs`'s "load a directory of JSON/JSONL
//! files into an in-memory index at construction time" shape, generalized
//! from a read-only startup load to an append-only log with a
//! writer-serialized, reader-never-blocked split (§5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};
use vg_domain::{RunId, RunRecord, WorkerId};
use vg_ports::{CollaborationMemory, MemoryError, MemorySearch, MemoryStats};

/// In-memory secondary index over the log, rebuilt at startup and
/// incrementally maintained on each append. Held behind an `RwLock` so
/// concurrent readers (`recent`, `search`, `stats`) never block on each
/// other or on a writer holding only the log-file mutex.
struct Index {
    records: Vec<RunRecord>,
    by_worker: HashMap<WorkerId, Vec<usize>>,
    /// Ten-bucket confidence histogram, bucket `i` covers `[i/10, (i+1)/10)`.
    confidence_buckets: HashMap<usize, Vec<usize>>,
}

impl Index {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            by_worker: HashMap::new(),
            confidence_buckets: HashMap::new(),
        }
    }

    fn insert(&mut self, record: RunRecord) {
        let offset = self.records.len();
        for result in &record.worker_results {
            self.by_worker.entry(result.worker_id).or_default().push(offset);
        }
        let bucket = confidence_bucket(record.reflection.confidence);
        self.confidence_buckets.entry(bucket).or_default().push(offset);
        self.records.push(record);
    }
}

fn confidence_bucket(confidence: f64) -> usize {
    ((confidence.clamp(0.0, 1.0) * 10.0) as usize).min(9)
}

/// File-backed `CollaborationMemory` adapter.
pub struct FileCollaborationMemory {
    log_path: PathBuf,
    analysis_dir: PathBuf,
    writer: AsyncMutex<()>,
    index: RwLock<Index>,
}

impl FileCollaborationMemory {
    /// Load (or create) the log at `<base_dir>/memory/collaboration.log`,
    /// rebuilding the in-memory index by reading it sequentially once.
    #[instrument(skip_all, fields(base_dir = %base_dir.as_ref().display()))]
    pub async fn load(base_dir: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let base_dir = base_dir.as_ref();
        let memory_dir = base_dir.join("memory");
        let analysis_dir = base_dir.join("analysis");
        fs::create_dir_all(&memory_dir)
            .await
            .map_err(|e| MemoryError::Io { message: e.to_string() })?;
        fs::create_dir_all(&analysis_dir)
            .await
            .map_err(|e| MemoryError::Io { message: e.to_string() })?;

        let log_path = memory_dir.join("collaboration.log");
        let mut index = Index::empty();

        match fs::read_to_string(&log_path).await {
            Ok(contents) => {
                for (line_no, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RunRecord>(line) {
                        Ok(record) => index.insert(record),
                        Err(e) => warn!(line_no, error = %e, "skipping malformed collaboration log line"),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MemoryError::Io { message: e.to_string() }),
        }

        Ok(Self {
            log_path,
            analysis_dir,
            writer: AsyncMutex::new(()),
            index: RwLock::new(index),
        })
    }

    async fn mirror_to_analysis(&self, record: &RunRecord) -> Result<(), MemoryError> {
        let serialized = serde_json::to_vec_pretty(record).map_err(|e| MemoryError::Serialization { message: e.to_string() })?;

        let report_path = self.analysis_dir.join(format!("report_{}.json", record.run_id.as_str()));
        fs::write(&report_path, &serialized)
            .await
            .map_err(|e| MemoryError::Io { message: e.to_string() })?;

        let last_path = self.analysis_dir.join("last_reasoning.json");
        fs::write(&last_path, &serialized)
            .await
            .map_err(|e| MemoryError::Io { message: e.to_string() })?;

        Ok(())
    }
}

impl CollaborationMemory for FileCollaborationMemory {
    async fn append(&self, record: RunRecord) -> Result<(), MemoryError> {
        let line = serde_json::to_string(&record).map_err(|e| MemoryError::Serialization { message: e.to_string() })?;

        {
            let _guard = self.writer.lock().await;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
                .await
                .map_err(|e| MemoryError::Io { message: e.to_string() })?;
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| MemoryError::Io { message: e.to_string() })?;
            file.write_all(b"\n").await.map_err(|e| MemoryError::Io { message: e.to_string() })?;
            file.sync_all().await.map_err(|e| MemoryError::Io { message: e.to_string() })?;
        }

        self.mirror_to_analysis(&record).await?;

        let mut index = self.index.write().expect("collaboration memory index lock poisoned");
        index.insert(record);
        Ok(())
    }

    async fn recent(&self, n: usize) -> Result<Vec<RunRecord>, MemoryError> {
        let index = self.index.read().expect("collaboration memory index lock poisoned");
        Ok(index.records.iter().rev().take(n).cloned().collect())
    }

    async fn search(&self, query: MemorySearch) -> Result<Vec<RunRecord>, MemoryError> {
        let index = self.index.read().expect("collaboration memory index lock poisoned");

        let candidate_offsets: Vec<usize> = match &query.worker {
            Some(worker_id) => index.by_worker.get(worker_id).cloned().unwrap_or_default(),
            None => (0..index.records.len()).collect(),
        };

        let mut matches: Vec<&RunRecord> = candidate_offsets
            .into_iter()
            .filter_map(|offset| index.records.get(offset))
            .filter(|record| {
                query
                    .query_substring
                    .as_ref()
                    .map(|needle| record.query.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(true)
            })
            .filter(|record| query.min_confidence.map(|floor| record.reflection.confidence >= floor).unwrap_or(true))
            .collect();

        // Rank by recency: higher index in `records` means more recently appended.
        matches.sort_by_key(|record| std::cmp::Reverse(record_offset(&index, record)));
        Ok(matches.into_iter().cloned().collect())
    }

    async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        let index = self.index.read().expect("collaboration memory index lock poisoned");

        let mut per_worker_counts = std::collections::BTreeMap::new();
        for (worker_id, offsets) in &index.by_worker {
            per_worker_counts.insert(worker_id.as_str().to_string(), offsets.len());
        }

        let mut confidence_histogram = [0usize; 10];
        for (bucket, offsets) in &index.confidence_buckets {
            if *bucket < 10 {
                confidence_histogram[*bucket] = offsets.len();
            }
        }

        Ok(MemoryStats {
            total_runs: index.records.len(),
            per_worker_counts,
            confidence_histogram,
        })
    }
}

fn record_offset(index: &Index, record: &RunRecord) -> usize {
    index
        .records
        .iter()
        .position(|r| r.run_id.as_str() == record.run_id.as_str())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vg_domain::{ConsistencyCheck, Framework, Reflection, TaskKind, WorkerResult, WorkerStatus};

    fn sample_record(query: &str, confidence: f64) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            run_id: RunId::new(),
            query: query.to_string(),
            task_kind: TaskKind::Analyze,
            selected_workers: vec![WorkerId::Analyst],
            framework: Framework::None,
            worker_results: vec![WorkerResult {
                worker_id: WorkerId::Analyst,
                status: WorkerStatus::Ok,
                output_text: "output".to_string(),
                structured_output: Default::default(),
                artifacts: Vec::new(),
                duration_ms: 5,
                evidence_used: None,
            }],
            synthesis_text: "brief".to_string(),
            reflection: Reflection {
                confidence,
                contradictions: Vec::new(),
                rerun: Vec::new(),
                consistency_check: ConsistencyCheck::default(),
                review_notes: String::new(),
            },
            iteration_count: 1,
            started_at: now,
            finished_at: now,
        }
    }

    #[tokio::test]
    async fn append_then_recent_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let memory = FileCollaborationMemory::load(dir.path()).await.unwrap();

        memory.append(sample_record("first query", 0.8)).await.unwrap();
        memory.append(sample_record("second query", 0.4)).await.unwrap();

        let recent = memory.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "second query");
        assert_eq!(recent[1].query, "first query");
    }

    #[tokio::test]
    async fn search_filters_by_min_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let memory = FileCollaborationMemory::load(dir.path()).await.unwrap();
        memory.append(sample_record("low confidence run", 0.2)).await.unwrap();
        memory.append(sample_record("high confidence run", 0.9)).await.unwrap();

        let results = memory
            .search(MemorySearch { query_substring: None, worker: None, min_confidence: Some(0.5) })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query, "high confidence run");
    }

    #[tokio::test]
    async fn index_rebuilds_from_existing_log_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let memory = FileCollaborationMemory::load(dir.path()).await.unwrap();
            memory.append(sample_record("persisted query", 0.6)).await.unwrap();
        }

        let reloaded = FileCollaborationMemory::load(dir.path()).await.unwrap();
        let recent = reloaded.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].query, "persisted query");
    }

    #[tokio::test]
    async fn stats_reports_per_worker_counts_and_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let memory = FileCollaborationMemory::load(dir.path()).await.unwrap();
        memory.append(sample_record("q1", 0.75)).await.unwrap();

        let stats = memory.stats().await.unwrap();
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.per_worker_counts.get("analyst"), Some(&1));
        assert_eq!(stats.confidence_histogram[7], 1);
    }
}
