//! A corpus declared in the platform document but without a built index
//! is still visible to the Orchestrator, and a run that selects it still
//! completes — retrieval against it fails gracefully and is excluded
//! from fusion rather than surfacing as a hard error.

mod common;

#[tokio::test]
async fn declared_but_unbuilt_corpus_does_not_fail_the_run() {
    let server = common::start_with_options(common::StartOptions {
        declared_corpora: vec![("imf", &["economy"])],
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", server.base_url))
        .json(&serde_json::json!({
            "query": "Economic sanctions and IMF leverage on trade",
            "stream": false,
        }))
        .send()
        .await
        .expect("request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse json");
    assert_eq!(body["status"], "ok");
    assert!(!body["response"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn status_reports_declared_corpus_before_its_index_is_built() {
    let server = common::start_with_options(common::StartOptions {
        declared_corpora: vec![("imf", &["economy"])],
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let body: serde_json::Value =
        client.get(format!("{}/status", server.base_url)).send().await.expect("request failed").json().await.expect("parse json");

    let corpora = body["corpora"].as_array().expect("corpora array");
    let imf = corpora.iter().find(|c| c["corpus_id"] == "imf").expect("imf corpus reported");
    assert_eq!(imf["index_built"], false);

    let acled = corpora.iter().find(|c| c["corpus_id"] == "acled").expect("acled corpus reported");
    assert_eq!(acled["index_built"], true);
}
