//! Routing a query is a pure function of its text: two separately
//! dispatched runs of the same query select the same workers, corpora
//! framework, and task kind.

mod common;

#[tokio::test]
async fn identical_queries_select_identical_workers_and_framework() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let query = "Conflict escalation and hotspots in Sudan 2022-2025";
    for _ in 0..2 {
        let resp = client
            .post(format!("{}/chat", server.base_url))
            .json(&serde_json::json!({"query": query, "stream": false}))
            .send()
            .await
            .expect("request failed");
        assert!(resp.status().is_success());
    }

    let history = client
        .get(format!("{}/history?n=2", server.base_url))
        .send()
        .await
        .expect("history request failed")
        .json::<serde_json::Value>()
        .await
        .expect("parse history json");

    let runs = history["runs"].as_array().expect("runs array");
    assert_eq!(runs.len(), 2);

    assert_eq!(runs[0]["selected_workers"], runs[1]["selected_workers"]);
    assert_eq!(runs[0]["framework"], runs[1]["framework"]);
    assert_eq!(runs[0]["task_kind"], runs[1]["task_kind"]);
}
