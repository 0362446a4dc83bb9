//! Cache (C11): sha256-fingerprinted, shard-sliced, file-backed cache for
//! retrieval/generation/embedding results.
//!
//! Grounded on `file_evidence_store.rs`'s manifest/content-hashing
//! discipline (reused here for fingerprinting) and on the lock-per-shard
//! contention pattern documented for the Memory log in §5, applied instead
//! to cache writes per §4.11.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::instrument;
use vg_ports::{Cache, CacheError};

const SHARD_BUCKETS: usize = 256;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    value: serde_json::Value,
    cached_at: DateTime<Utc>,
    kind: String,
}

/// File-backed `Cache` adapter with one lock per shard bucket, keyed by the
/// first byte of the fingerprint, to bound write contention without a
/// single global lock.
pub struct FileCache {
    base_dir: PathBuf,
    shard_locks: Vec<Mutex<()>>,
}

impl FileCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let mut shard_locks = Vec::with_capacity(SHARD_BUCKETS);
        for _ in 0..SHARD_BUCKETS {
            shard_locks.push(Mutex::new(()));
        }
        Self { base_dir: base_dir.into(), shard_locks }
    }

    /// Compute the fingerprint `sha256(kind || 0x00 || canonical_json(input))`,
    /// hex-encoded. `input` is serialized through `serde_json::to_value` first
    /// so key order is normalized regardless of the caller's field order.
    pub fn fingerprint(kind: &str, input: &serde_json::Value) -> Result<String, CacheError> {
        let canonical = canonicalize(input);
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        let shard = &fingerprint[..2.min(fingerprint.len())];
        self.base_dir.join(shard).join(format!("{fingerprint}.bin"))
    }

    fn shard_index(fingerprint: &str) -> usize {
        fingerprint
            .get(..2)
            .and_then(|prefix| u8::from_str_radix(prefix, 16).ok())
            .map(|b| b as usize)
            .unwrap_or(0)
    }
}

/// Serialize `value` with object keys sorted, so semantically identical
/// inputs hash identically regardless of construction order.
fn canonicalize(value: &serde_json::Value) -> String {
    fn sort(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut sorted = serde_json::Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    sorted.insert(key.clone(), sort(&map[key]));
                }
                serde_json::Value::Object(sorted)
            }
            serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

impl Cache for FileCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str, max_age: Option<std::time::Duration>) -> Result<Option<serde_json::Value>, CacheError> {
        let path = self.path_for(key);
        let contents = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { message: e.to_string() }),
        };

        let envelope: CacheEnvelope =
            serde_json::from_slice(&contents).map_err(|e| CacheError::Io { message: format!("corrupt cache entry: {e}") })?;

        if let Some(max_age) = max_age {
            let age = Utc::now().signed_duration_since(envelope.cached_at);
            let age = age.to_std().unwrap_or(std::time::Duration::ZERO);
            if age > max_age {
                return Ok(None);
            }
        }

        Ok(Some(envelope.value))
    }

    #[instrument(skip(self, value))]
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let shard_dir = path.parent().expect("cache path always has a shard parent");
        fs::create_dir_all(shard_dir).await.map_err(|e| CacheError::Io { message: e.to_string() })?;

        let envelope = CacheEnvelope { value, cached_at: Utc::now(), kind: String::new() };
        let serialized = serde_json::to_vec(&envelope).map_err(|e| CacheError::Io { message: e.to_string() })?;

        let shard_index = Self::shard_index(key) % self.shard_locks.len();
        let _guard = self.shard_locks[shard_index].lock().await;

        let tmp_path = path.with_extension("bin.tmp");
        fs::write(&tmp_path, &serialized).await.map_err(|e| CacheError::Io { message: e.to_string() })?;
        fs::rename(&tmp_path, &path).await.map_err(|e| CacheError::Io { message: e.to_string() })?;

        Ok(())
    }
}

/// Build a cache key for a `(kind, input)` pair, given the kind string used
/// throughout this codebase (`retrieve | generate | embed | websearch`).
pub fn cache_key(kind: &str, input: &serde_json::Value) -> Result<String, CacheError> {
    FileCache::fingerprint(kind, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_stable_under_key_reordering() {
        let a = json!({"query": "sudan", "top_k": 5});
        let b = json!({"top_k": 5, "query": "sudan"});
        let fp_a = FileCache::fingerprint("retrieve", &a).unwrap();
        let fp_b = FileCache::fingerprint("retrieve", &b).unwrap();
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn fingerprint_differs_by_kind() {
        let input = json!({"text": "hello"});
        let fp_generate = FileCache::fingerprint("generate", &input).unwrap();
        let fp_embed = FileCache::fingerprint("embed", &input).unwrap();
        assert_ne!(fp_generate, fp_embed);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = FileCache::fingerprint("generate", &json!({"prompt": "hi"})).unwrap();

        cache.put(&key, json!({"text": "hello there"})).await.unwrap();
        let found = cache.get(&key, None).await.unwrap();
        assert_eq!(found, Some(json!({"text": "hello there"})));
    }

    #[tokio::test]
    async fn get_misses_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let found = cache.get("deadbeef", None).await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn get_respects_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = FileCache::fingerprint("retrieve", &json!({"q": "x"})).unwrap();
        cache.put(&key, json!({"v": 1})).await.unwrap();

        let fresh = cache.get(&key, Some(std::time::Duration::from_secs(3600))).await.unwrap();
        assert!(fresh.is_some());

        let stale = cache.get(&key, Some(std::time::Duration::from_secs(0))).await.unwrap();
        assert!(stale.is_none());
    }
}
