//! Shared in-process test harness for the `tests/integration/*.rs` suite.
//!
//! Builds a real `AppState`/`build_router` stack over a tempdir data
//! directory and a `wiremock`-stubbed generation service, bound to an
//! ephemeral `TcpListener`, so the black-box tests below drive the actual
//! axum router exactly the way a client would rather than calling handlers
//! directly.

#![allow(dead_code)]

use std::time::Duration;

use tempfile::TempDir;
use vg_api::config::AppConfig;
use vg_api::state::AppState;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A single static low-confidence reflection verdict returned on every
/// `/generate` call made with `"stream":false` (both the analyst/geo
/// workers' draft passes and the reflection worker's own evaluation go
/// through this same non-streaming call, and this harness does not
/// distinguish between them). Combined with the fixed `MAX_ITER = 2`
/// budget this deterministically drives a two-iteration re-run without
/// depending on wiremock's response-sequencing behavior.
const GENERATE_RESPONSE: &str = r#"{"text":"{\"confidence\":0.4,\"rerun\":[\"analyst\"],\"contradictions\":[]}"}"#;

const SYNTHESIS_NDJSON: &str = "{\"delta\":\"This brief addresses the query. \"}\n{\"delta\":\"Evidence supports the assessment.\"}\n";

pub struct TestServer {
    pub base_url: String,
    _mock_server: MockServer,
    _data_dir: TempDir,
    _server_task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self._server_task.abort();
    }
}

/// Write a single "acled" corpus, tagged `conflict`, with one record whose
/// embedding exactly matches the stubbed `/embed` response so retrieval
/// always returns a non-empty, deterministic fused-evidence set.
fn write_fixture_corpus(data_dir: &std::path::Path) {
    let corpus_dir = data_dir.join("vector_index").join("acled");
    std::fs::create_dir_all(&corpus_dir).expect("create fixture corpus dir");

    std::fs::write(
        corpus_dir.join("manifest.json"),
        r#"{"reliability_weight":0.9,"tags":["conflict"]}"#,
    )
    .expect("write fixture manifest");

    let record = r#"{"corpus_id":"acled","text":"Conflict escalation reported in Darfur region, Sudan.","similarity_score":0.0,"metadata":{},"embedding":[1.0,0.0]}"#;
    std::fs::write(corpus_dir.join("records.jsonl"), format!("{record}\n")).expect("write fixture records");
}

/// Tuning knobs for [`start_with_options`]; [`start`] uses the defaults.
pub struct StartOptions {
    /// Delay applied to every non-streaming `/generate` response (worker
    /// draft passes and the reflection verdict). Used to widen the window
    /// in which a client can disconnect mid-run.
    pub generate_delay: Duration,
    /// Extra corpora declared in the platform document in addition to the
    /// "acled" fixture corpus that always has a built index. These have no
    /// `vector_index/` directory, so retrieval against them fails.
    pub declared_corpora: Vec<(&'static str, &'static [&'static str])>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self { generate_delay: Duration::ZERO, declared_corpora: Vec::new() }
    }
}

/// Start a `wiremock` server stubbing the generation service's `/embed` and
/// `/generate` endpoints, build an `AppState` pointed at a tempdir with one
/// fixture corpus, and serve `build_router(state)` on an ephemeral port.
pub async fn start() -> TestServer {
    start_with_options(StartOptions::default()).await
}

pub async fn start_with_options(options: StartOptions) -> TestServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": [1.0, 0.0]})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_string(GENERATE_RESPONSE).set_delay(options.generate_delay))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(SYNTHESIS_NDJSON))
        .mount(&mock_server)
        .await;

    let data_dir = TempDir::new().expect("create tempdir");
    write_fixture_corpus(data_dir.path());

    let mut config = AppConfig::default();
    config.data_dir = data_dir.path().to_path_buf();
    config.logs_dir = data_dir.path().join("logs");
    config.generator_base_url = mock_server.uri();
    config.overall_deadline = Duration::from_secs(10);
    config.reflection_deadline = Duration::from_secs(5);
    for (id, tags) in &options.declared_corpora {
        config.platform.corpora.push(vg_api::config::CorpusDeclaration {
            id: id.to_string(),
            path: data_dir.path().join("ingest").join(id),
            weight: 1.0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
    }

    let state = AppState::build(config).await.expect("build app state");
    let app = vg_api::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let server_task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        _mock_server: mock_server,
        _data_dir: data_dir,
        _server_task: server_task,
    }
}
