//! OpenAI-compatibility smoke test: `/v1/chat/completions` and
//! `/v1/models` speak the shape an OpenAI client expects.

mod common;

#[tokio::test]
async fn chat_completions_streams_openai_shaped_chunks() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/v1/chat/completions", server.base_url))
        .json(&serde_json::json!({
            "model": "default-chat",
            "messages": [{"role": "user", "content": "Analyze the economic trend impact"}],
            "stream": true,
        }))
        .send()
        .await
        .expect("request failed");

    assert!(resp.status().is_success());
    let body = resp.text().await.expect("read body");

    assert!(body.contains("chat.completion.chunk"), "missing OpenAI chunk object:\n{body}");
    assert!(body.contains("\"finish_reason\":\"stop\""), "missing stop terminator:\n{body}");
    assert!(body.trim_end().ends_with("data: [DONE]"), "stream did not end with [DONE]:\n{body}");

    // No worker/phase/reflection event leaks onto the OpenAI-compatible
    // surface; only synthesis text and the two terminal chunks may appear.
    assert!(!body.contains("**reflection**"), "reflection text leaked onto OpenAI surface:\n{body}");
}

#[tokio::test]
async fn chat_completions_buffered_returns_a_single_choice() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/v1/chat/completions", server.base_url))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "Analyze the economic trend impact"}],
            "stream": false,
        }))
        .send()
        .await
        .expect("request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse json");

    assert_eq!(body["object"], "chat.completion");
    let choices = body["choices"].as_array().expect("choices array");
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0]["message"]["role"], "assistant");
    assert_eq!(choices[0]["finish_reason"], "stop");
    assert!(!choices[0]["message"]["content"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn models_endpoint_lists_configured_workers() {
    let server = common::start().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/v1/models", server.base_url)).send().await.expect("request failed");
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.expect("parse json");
    assert_eq!(body["object"], "list");
    let ids: Vec<String> = body["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|m| m["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(ids.contains(&"analyst".to_string()), "model ids: {ids:?}");
    assert!(ids.contains(&"geo".to_string()), "model ids: {ids:?}");
}
