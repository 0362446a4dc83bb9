//! Cache-consulting decorators over `Generator` and `EvidenceStore` (C11).
//!
//! Per §4.11, the Cache is consulted before Evidence Store retrieval and
//! before any non-streaming generation call; streaming generation is never
//! cached. Rather than thread cache lookups into every call site (the
//! worker implementations and `FileEvidenceStore` call their port directly),
//! these wrap an inner port and splice the cache check around it —
//! the same "adapter wraps a port" shape as `file_cache.rs` itself.

use std::future::Future;

use futures::stream::BoxStream;
use serde_json::json;
use tracing::{instrument, warn};
use vg_domain::{CorpusId, CorpusInfo, EvidenceRecord};
use vg_ports::{Cache, EvidenceStore, EvidenceStoreError, Generator, GeneratorError};

use crate::file_cache::cache_key;

/// Wraps a `Generator` so `generate`/`embed` consult `cache` first.
/// `generate_stream` is passed straight through, uncached, per §4.11.
pub struct CachingGenerator<G, C> {
    inner: G,
    cache: C,
}

impl<G, C> CachingGenerator<G, C> {
    pub fn new(inner: G, cache: C) -> Self {
        Self { inner, cache }
    }
}

impl<G: Generator, C: Cache> Generator for CachingGenerator<G, C> {
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GeneratorError> {
        let input = json!({ "prompt": prompt, "model_id": model_id });
        let key = match cache_key("generate", &input) {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "failed to fingerprint generate call, bypassing cache");
                return self.inner.generate(prompt, model_id).await;
            }
        };

        if let Ok(Some(cached)) = self.cache.get(&key, None).await {
            if let Some(text) = cached.get("text").and_then(|v| v.as_str()) {
                return Ok(text.to_string());
            }
        }

        let text = self.inner.generate(prompt, model_id).await?;
        if let Err(e) = self.cache.put(&key, json!({ "text": text })).await {
            warn!(error = %e, "failed to write generate result to cache");
        }
        Ok(text)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> Result<BoxStream<'static, Result<String, GeneratorError>>, GeneratorError> {
        self.inner.generate_stream(prompt, model_id).await
    }

    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, GeneratorError> {
        let input = json!({ "text": text, "model_id": model_id });
        let key = match cache_key("embed", &input) {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "failed to fingerprint embed call, bypassing cache");
                return self.inner.embed(text, model_id).await;
            }
        };

        if let Ok(Some(cached)) = self.cache.get(&key, None).await {
            if let Some(vector) = cached.get("vector").and_then(|v| v.as_array()) {
                let parsed: Option<Vec<f32>> = vector.iter().map(|x| x.as_f64().map(|f| f as f32)).collect();
                if let Some(parsed) = parsed {
                    return Ok(parsed);
                }
            }
        }

        let vector = self.inner.embed(text, model_id).await?;
        if let Err(e) = self.cache.put(&key, json!({ "vector": vector })).await {
            warn!(error = %e, "failed to write embed result to cache");
        }
        Ok(vector)
    }
}

/// Wraps an `EvidenceStore` so `retrieve` consults `cache` first. `strict`
/// is folded into the call but not the fingerprint: it governs behavior on
/// a miss, not the identity of the cached value.
pub struct CachingEvidenceStore<E, C> {
    inner: E,
    cache: C,
}

impl<E, C> CachingEvidenceStore<E, C> {
    pub fn new(inner: E, cache: C) -> Self {
        Self { inner, cache }
    }
}

impl<E: EvidenceStore, C: Cache> EvidenceStore for CachingEvidenceStore<E, C> {
    #[instrument(skip(self, query_text), fields(corpus_id = %corpus_id))]
    async fn retrieve(
        &self,
        query_text: &str,
        corpus_id: &CorpusId,
        top_k: usize,
        strict: bool,
    ) -> Result<Vec<EvidenceRecord>, EvidenceStoreError> {
        let input = json!({ "query_text": query_text, "corpus_id": corpus_id.as_str(), "top_k": top_k });
        let key = cache_key("retrieve", &input).ok();

        if let Some(key) = &key {
            if let Ok(Some(cached)) = self.cache.get(key, None).await {
                if let Ok(records) = serde_json::from_value::<Vec<EvidenceRecord>>(cached) {
                    return Ok(records);
                }
            }
        }

        let records = self.inner.retrieve(query_text, corpus_id, top_k, strict).await?;

        if let Some(key) = &key {
            if let Ok(value) = serde_json::to_value(&records) {
                if let Err(e) = self.cache.put(key, value).await {
                    warn!(error = %e, "failed to write retrieval result to cache");
                }
            }
        }

        Ok(records)
    }

    async fn list_corpora(&self) -> Result<Vec<CorpusInfo>, EvidenceStoreError> {
        self.inner.list_corpora().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_cache::FileCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
    }

    impl Generator for CountingGenerator {
        async fn generate(&self, _prompt: &str, _model_id: &str) -> Result<String, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("generated text".to_string())
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _model_id: &str,
        ) -> Result<BoxStream<'static, Result<String, GeneratorError>>, GeneratorError> {
            unimplemented!("not exercised in caching tests")
        }

        async fn embed(&self, _text: &str, _model_id: &str) -> Result<Vec<f32>, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    #[tokio::test]
    async fn repeated_generate_hits_cache_after_first_call() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let caching = CachingGenerator::new(CountingGenerator { calls: calls.clone() }, FileCache::new(dir.path()));

        let first = caching.generate("prompt", "model-a").await.unwrap();
        let second = caching.generate("prompt", "model-a").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_prompts_bypass_each_others_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let caching = CachingGenerator::new(CountingGenerator { calls: calls.clone() }, FileCache::new(dir.path()));

        caching.generate("prompt one", "model-a").await.unwrap();
        caching.generate("prompt two", "model-a").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
