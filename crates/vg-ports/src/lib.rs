//! Vantage Port Traits
//!
//! This crate defines the port interfaces (traits) that adapters must
//! implement. Per the hexagonal split carried over from this codebase's
//! lineage, these ports are:
//! - EvidenceStore (C1)
//! - Generator (the external generation/embedding interface, §6)
//! - CollaborationMemory (C10)
//! - Cache (C11)
//! - Clock

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use vg_domain::{CorpusId, CorpusInfo, EvidenceRecord, RunRecord};

/// Evidence store port per §4.1.
///
/// Retrieval is read-only during a run; implementations must be safe for
/// concurrent calls from multiple workers.
pub trait EvidenceStore: Send + Sync {
    /// Retrieve up to `top_k` records for `query_text` against `corpus_id`,
    /// ordered by descending similarity. Returns an empty vec (never blocks
    /// indefinitely) on embedder timeout unless `strict` is set, in which
    /// case the timeout surfaces as `EvidenceStoreError::Timeout`.
    fn retrieve(
        &self,
        query_text: &str,
        corpus_id: &CorpusId,
        top_k: usize,
        strict: bool,
    ) -> impl Future<Output = Result<Vec<EvidenceRecord>, EvidenceStoreError>> + Send;

    /// The full set of configured corpora and their metadata.
    fn list_corpora(&self) -> impl Future<Output = Result<Vec<CorpusInfo>, EvidenceStoreError>> + Send;
}

/// Evidence store errors.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceStoreError {
    #[error("corpus unavailable: {corpus_id}")]
    CorpusUnavailable { corpus_id: String },

    #[error("embedder timeout retrieving from {corpus_id}")]
    Timeout { corpus_id: String },

    #[error("storage error: {message}")]
    StorageError { message: String },
}

/// The external generation/embedding interface (§6). Pluggable: concrete
/// adapters speak whatever protocol the locally hosted model server uses.
pub trait Generator: Send + Sync {
    /// Generate text for `prompt`, buffering the entire response.
    fn generate(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> impl Future<Output = Result<String, GeneratorError>> + Send;

    /// Generate text for `prompt`, yielding incremental segments as they
    /// arrive. The concatenation of yielded segments must be byte-identical
    /// to what `generate` would have returned for the same inputs.
    fn generate_stream(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<String, GeneratorError>>, GeneratorError>> + Send;

    /// Embed `text` into a fixed-dimension vector.
    fn embed(&self, text: &str, model_id: &str) -> impl Future<Output = Result<Vec<f32>, GeneratorError>> + Send;
}

/// Generator errors.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generation service unreachable: {message}")]
    Unavailable { message: String },

    #[error("embedding service unreachable: {message}")]
    EmbedderUnavailable { message: String },

    #[error("generation request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

/// Collaboration Memory port per §4.10.
pub trait CollaborationMemory: Send + Sync {
    /// Atomically append a run record to the durable log.
    fn append(&self, record: RunRecord) -> impl Future<Output = Result<(), MemoryError>> + Send;

    /// The `n` most recently appended records, most recent first.
    fn recent(&self, n: usize) -> impl Future<Output = Result<Vec<RunRecord>, MemoryError>> + Send;

    /// Search by optional substring/worker/confidence filters, ranked by
    /// recency.
    fn search(&self, query: MemorySearch) -> impl Future<Output = Result<Vec<RunRecord>, MemoryError>> + Send;

    /// Aggregate statistics over all persisted records.
    fn stats(&self) -> impl Future<Output = Result<MemoryStats, MemoryError>> + Send;
}

/// Search filters for `CollaborationMemory::search`.
#[derive(Debug, Clone, Default)]
pub struct MemorySearch {
    pub query_substring: Option<String>,
    pub worker: Option<vg_domain::WorkerId>,
    pub min_confidence: Option<f64>,
}

/// Aggregate statistics over the memory log.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    pub total_runs: usize,
    pub per_worker_counts: std::collections::BTreeMap<String, usize>,
    /// Ten-bucket histogram over `[0.0, 1.0]` confidence.
    pub confidence_histogram: [usize; 10],
}

/// Memory errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

/// Cache port per §4.11.
pub trait Cache: Send + Sync {
    /// Look up `key`; `max_age` bounds freshness (`None` means no expiry).
    fn get(
        &self,
        key: &str,
        max_age: Option<std::time::Duration>,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, CacheError>> + Send;

    fn put(&self, key: &str, value: serde_json::Value) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {message}")]
    Io { message: String },
}

/// Clock port for deterministic time handling in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
