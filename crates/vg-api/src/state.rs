//! `AppState`: the `Arc`s every handler needs, built once in `main.rs`.
//!
//! Grounded on `sr-api/src/main.rs`'s `AppState` shape (one struct of
//! shared, cheaply-cloneable handles passed to every axum handler via
//! `State<AppState>`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use vg_adapters::workers::{AnalystWorker, CodeWorker, GeoWorker, RedactorWorker, SearchWorker};
use vg_adapters::{
    CachingEvidenceStore, CachingGenerator, Executor, FileCache, FileCollaborationMemory, FileEvidenceStore, HttpGenerator,
    RegisteredWorker, Worker,
};
use vg_domain::WorkerId;

use crate::config::AppConfig;

/// The concrete `Generator` every adapter in this deployment speaks
/// through: an `HttpGenerator` wrapped in a cache-consulting decorator.
pub type Gen = CachingGenerator<HttpGenerator, Arc<FileCache>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub generator: Arc<Gen>,
    pub evidence_store: Arc<CachingEvidenceStore<FileEvidenceStore<Gen>, Arc<FileCache>>>,
    pub memory: Arc<FileCollaborationMemory>,
    pub cache: Arc<FileCache>,
    pub executor: Arc<Executor>,
    pub registry: Arc<HashMap<WorkerId, RegisteredWorker<Gen>>>,
    pub maps_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> Result<Self, vg_domain::DomainError> {
        let config = Arc::new(config);

        let cache = Arc::new(FileCache::new(config.data_dir.join("cache")));

        let raw_generator = HttpGenerator::new(config.generator_base_url.clone(), config.generator_timeout);
        let generator: Arc<Gen> = Arc::new(CachingGenerator::new(raw_generator, cache.clone()));

        let raw_evidence_store = FileEvidenceStore::load(
            &config.data_dir.join("vector_index"),
            generator.clone(),
            config.embedding_model_id.clone(),
            Duration::from_secs(5),
        );
        let evidence_store = Arc::new(CachingEvidenceStore::new(raw_evidence_store, cache.clone()));

        let memory = Arc::new(
            FileCollaborationMemory::load(&config.data_dir)
                .await
                .map_err(|e| vg_domain::DomainError::ConfigInvalid { reason: e.to_string() })?,
        );

        let maps_dir = config.data_dir.join("maps");

        let mut registry: HashMap<WorkerId, RegisteredWorker<Gen>> = HashMap::new();
        for decl in &config.platform.workers {
            let Some(worker_id) = WorkerId::from_str_lossy(&decl.id) else {
                return Err(vg_domain::DomainError::UnknownWorker { worker_id: decl.id.clone() });
            };
            let worker: Arc<dyn Worker<Gen>> = match worker_id {
                WorkerId::Search => Arc::new(SearchWorker { model_id: decl.model_id.clone() }),
                WorkerId::Analyst => Arc::new(AnalystWorker { model_id: decl.model_id.clone() }),
                WorkerId::Geo => Arc::new(GeoWorker { model_id: decl.model_id.clone(), maps_dir: maps_dir.clone() }),
                WorkerId::Code => Arc::new(CodeWorker { interpreter: "python3".to_string() }),
                WorkerId::Redactor => Arc::new(RedactorWorker { model_id: decl.model_id.clone() }),
                WorkerId::Reflection => continue, // invoked directly by the reflection loop, never dispatched via the registry
            };
            registry.insert(worker_id, RegisteredWorker { worker, deadline: Duration::from_millis(decl.timeout_ms) });
        }

        let executor = Arc::new(Executor::new(config.max_parallel, config.overall_deadline, config.grace_window));

        Ok(Self {
            config,
            generator,
            evidence_store,
            memory,
            cache,
            executor,
            registry: Arc::new(registry),
            maps_dir,
            started_at: Utc::now(),
        })
    }
}
