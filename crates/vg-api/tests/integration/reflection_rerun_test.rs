//! Reflection-driven adaptive re-run: a reflection verdict that never
//! clears the confidence floor still terminates, once
//! the fixed two-pass iteration budget (`MAX_ITER`) is exhausted, and the
//! persisted record reflects exactly that many iterations.
//!
//! The harness's stubbed reflection response is a single static low
//! confidence verdict (rather than a confidence sequence that climbs past
//! the floor on a later pass) so the test does not depend on `wiremock`
//! serving different bodies to successive identical requests — the
//! `MAX_ITER` ceiling alone is enough to make termination, and the
//! iteration count it produces, fully deterministic.

mod common;

#[tokio::test]
async fn low_confidence_reflection_drives_exactly_two_iterations() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", server.base_url))
        .json(&serde_json::json!({
            "query": "Analyze the economic trend impact",
            "stream": false,
        }))
        .send()
        .await
        .expect("request failed");
    assert!(resp.status().is_success());

    let history = client
        .get(format!("{}/history?n=1", server.base_url))
        .send()
        .await
        .expect("history request failed")
        .json::<serde_json::Value>()
        .await
        .expect("parse history json");

    let runs = history["runs"].as_array().expect("runs array");
    assert_eq!(runs.len(), 1);
    let run = &runs[0];

    assert_eq!(run["iteration_count"], 2);
    assert_eq!(run["reflection"]["confidence"], 0.4);
    assert_eq!(run["reflection"]["rerun"], serde_json::json!(["analyst"]));
    assert_eq!(run["selected_workers"], serde_json::json!(["analyst"]));
}
