//! Vantage Adapters
//!
//! Concrete implementations of the `vg-ports` traits, plus the stateful
//! orchestration components (Executor, Synthesis, Reflection) that need IO
//! and therefore cannot live in `vg-domain`.

pub mod caching;
pub mod executor;
pub mod file_cache;
pub mod file_evidence_store;
pub mod file_memory;
pub mod http_generator;
pub mod reflection;
pub mod synthesis;
pub mod worker;
pub mod workers;

pub use caching::{CachingEvidenceStore, CachingGenerator};
pub use executor::*;
pub use file_cache::FileCache;
pub use file_evidence_store::FileEvidenceStore;
pub use file_memory::FileCollaborationMemory;
pub use http_generator::HttpGenerator;
pub use reflection::reflect;
pub use synthesis::synthesize;
pub use worker::{CancellationToken, Worker, WorkerDeps};
pub use workers::redactor::condense;
