//! `/chat` end-to-end: geo+analyst fan-out for a conflict query, exercised
//! against the streaming and buffered response shapes.

mod common;

#[tokio::test]
async fn streaming_chat_fans_out_geo_and_analyst_and_terminates_once() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", server.base_url))
        .json(&serde_json::json!({
            "query": "Conflict escalation and hotspots in Sudan 2022-2025",
            "stream": true,
        }))
        .send()
        .await
        .expect("request failed");

    assert!(resp.status().is_success());
    let content_type = resp.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    assert!(content_type.starts_with("text/event-stream"), "unexpected content-type: {content_type}");

    let body = resp.text().await.expect("read body");

    assert!(body.contains("analyst"), "expected analyst worker events in stream:\n{body}");
    assert!(body.contains("geo"), "expected geo worker events in stream:\n{body}");

    // Exactly one terminator, and it is the last frame in the stream.
    let done_count = body.matches("[DONE]").count();
    assert_eq!(done_count, 1, "expected exactly one [DONE] terminator:\n{body}");
    let done_pos = body.find("[DONE]").unwrap();
    assert!(!body[done_pos + "[DONE]".len()..].contains("data:"), "events found after [DONE]:\n{body}");
}

#[tokio::test]
async fn buffered_chat_reports_workers_used_and_a_synthesis_response() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", server.base_url))
        .json(&serde_json::json!({
            "query": "Conflict escalation and hotspots in Sudan 2022-2025",
            "stream": false,
        }))
        .send()
        .await
        .expect("request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse json");

    assert_eq!(body["status"], "ok");
    assert!(!body["response"].as_str().unwrap_or_default().is_empty());

    let workers_used: Vec<String> = body["workers_used"]
        .as_array()
        .expect("workers_used array")
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();
    assert!(workers_used.contains(&"analyst".to_string()), "workers_used: {workers_used:?}");
    assert!(workers_used.contains(&"geo".to_string()), "workers_used: {workers_used:?}");
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", server.base_url))
        .json(&serde_json::json!({"query": "   "}))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}
