//! `AppConfig`: environment-driven process configuration plus the
//! `serde_yaml`-loaded corpora/workers document, per §6/§2a.
//!
//! Grounded on `sr-governor/src/config.rs`'s `from_env()`/`Default` idiom:
//! every field has a `VG_`-prefixed environment variable with a sane
//! default, loaded once at startup and treated as immutable for the
//! process lifetime (§5).

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use vg_domain::DomainError;

/// One corpus declared in the platform document. Authoritative
/// reliability weight and tags for an already-built corpus still live in
/// that corpus's own `manifest.json` (`FileEvidenceStore` reads those
/// directly) — this list exists so `GET /status` can report configured
/// corpora even before their indexes are built, and so `vg-api index
/// --corpus <id>` has a path to hand to the external ingester.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDeclaration {
    pub id: String,
    pub path: PathBuf,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_weight() -> f64 {
    1.0
}

/// One worker declared in the platform document.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerDeclaration {
    pub id: String,
    pub model_id: String,
    #[serde(default)]
    pub requires_evidence: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    60_000
}

/// The `VG_CONFIG_PATH` YAML document: corpora + worker declarations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformDocument {
    #[serde(default)]
    pub corpora: Vec<CorpusDeclaration>,
    #[serde(default)]
    pub workers: Vec<WorkerDeclaration>,
}

impl PlatformDocument {
    pub fn load(path: &std::path::Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DomainError::ConfigInvalid {
            reason: format!("cannot read platform document at {}: {e}", path.display()),
        })?;
        serde_yaml::from_str(&raw).map_err(|e| DomainError::ConfigInvalid {
            reason: format!("malformed platform document at {}: {e}", path.display()),
        })
    }

    fn default_document() -> Self {
        Self {
            corpora: Vec::new(),
            workers: vec![
                WorkerDeclaration { id: "search".into(), model_id: "default-chat".into(), requires_evidence: false, timeout_ms: 60_000 },
                WorkerDeclaration { id: "analyst".into(), model_id: "default-chat".into(), requires_evidence: true, timeout_ms: 60_000 },
                WorkerDeclaration { id: "geo".into(), model_id: "default-chat".into(), requires_evidence: true, timeout_ms: 60_000 },
                WorkerDeclaration { id: "code".into(), model_id: "default-chat".into(), requires_evidence: false, timeout_ms: 60_000 },
                WorkerDeclaration { id: "redactor".into(), model_id: "default-chat".into(), requires_evidence: false, timeout_ms: 60_000 },
            ],
        }
    }
}

/// Process-wide configuration, loaded once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_path: PathBuf,
    pub generator_base_url: String,
    pub generator_timeout: Duration,
    pub embedding_model_id: String,
    pub reflection_model_id: String,
    pub max_parallel: usize,
    pub overall_deadline: Duration,
    pub grace_window: Duration,
    pub reflection_deadline: Duration,
    pub retrieval_top_k: usize,
    pub log_format_json: bool,
    /// When set, retrieval surfaces embedder timeouts instead of degrading
    /// to an empty result, and startup fails (exit code 3) if the
    /// generation service cannot be reached. Set via `--strict` or
    /// `VG_STRICT`.
    pub strict_mode: bool,
    pub platform: PlatformDocument,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            config_path: PathBuf::from("config/platform.yaml"),
            generator_base_url: "http://localhost:8000".to_string(),
            generator_timeout: Duration::from_secs(30),
            embedding_model_id: "default-embed".to_string(),
            reflection_model_id: "default-chat".to_string(),
            max_parallel: 3,
            overall_deadline: Duration::from_secs(120),
            grace_window: Duration::from_secs(2),
            reflection_deadline: Duration::from_secs(60),
            retrieval_top_k: 5,
            log_format_json: false,
            strict_mode: false,
            platform: PlatformDocument::default_document(),
        }
    }
}

impl AppConfig {
    /// Load from environment variables (`VG_*`), falling back to
    /// `Default::default()` field-by-field, then load the platform
    /// document named by `config_path_override` (typically the CLI's
    /// `--config` flag) or `VG_CONFIG_PATH` if it exists (a missing file at
    /// the default path is not fatal — the built-in worker declarations
    /// above cover a minimal local deployment).
    pub fn from_env(config_path_override: Option<PathBuf>) -> Result<Self, DomainError> {
        let defaults = Self::default();

        let config_path = config_path_override
            .or_else(|| std::env::var("VG_CONFIG_PATH").ok().map(PathBuf::from))
            .unwrap_or(defaults.config_path.clone());

        let platform = if config_path.exists() {
            PlatformDocument::load(&config_path)?
        } else {
            defaults.platform.clone()
        };

        let max_iter: u32 = std::env::var("VG_MAX_ITER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(vg_adapters::reflection::MAX_ITER);
        if max_iter != vg_adapters::reflection::MAX_ITER {
            return Err(DomainError::ConfigInvalid {
                reason: format!(
                    "VG_MAX_ITER={max_iter} but this build's reflection loop is fixed at {}; \
                     remove the override or rebuild with a different iteration budget",
                    vg_adapters::reflection::MAX_ITER
                ),
            });
        }

        let confidence_floor: f64 = std::env::var("VG_CONFIDENCE_FLOOR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(vg_adapters::reflection::CONFIDENCE_FLOOR);
        if (confidence_floor - vg_adapters::reflection::CONFIDENCE_FLOOR).abs() > f64::EPSILON {
            return Err(DomainError::ConfigInvalid {
                reason: format!(
                    "VG_CONFIDENCE_FLOOR={confidence_floor} does not match this build's fixed floor of {}",
                    vg_adapters::reflection::CONFIDENCE_FLOOR
                ),
            });
        }

        Ok(Self {
            bind_addr: std::env::var("VG_BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins: std::env::var("VG_CORS_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
                .unwrap_or(defaults.cors_origins),
            data_dir: std::env::var("VG_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            logs_dir: std::env::var("VG_LOGS_DIR").map(PathBuf::from).unwrap_or(defaults.logs_dir),
            config_path,
            generator_base_url: std::env::var("VG_GENERATOR_URL").unwrap_or(defaults.generator_base_url),
            generator_timeout: std::env::var("VG_GENERATOR_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.generator_timeout),
            embedding_model_id: std::env::var("VG_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model_id),
            reflection_model_id: std::env::var("VG_REFLECTION_MODEL").unwrap_or(defaults.reflection_model_id),
            max_parallel: std::env::var("VG_MAX_PARALLEL").ok().and_then(|s| s.parse().ok()).unwrap_or(defaults.max_parallel),
            overall_deadline: std::env::var("VG_RUN_DEADLINE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.overall_deadline),
            grace_window: std::env::var("VG_GRACE_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_window),
            reflection_deadline: std::env::var("VG_REFLECTION_DEADLINE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.reflection_deadline),
            retrieval_top_k: std::env::var("VG_RETRIEVAL_TOP_K").ok().and_then(|s| s.parse().ok()).unwrap_or(defaults.retrieval_top_k),
            log_format_json: std::env::var("VG_LOG_FORMAT").map(|s| s == "json").unwrap_or(false),
            strict_mode: std::env::var("VG_STRICT").map(|s| s == "1" || s.eq_ignore_ascii_case("true")).unwrap_or(defaults.strict_mode),
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_five_builtin_workers() {
        let config = AppConfig::default();
        assert_eq!(config.platform.workers.len(), 5);
        assert!(config.platform.corpora.is_empty());
    }

    #[test]
    fn default_max_parallel_matches_spec_cap() {
        assert_eq!(AppConfig::default().max_parallel, 3);
    }
}
