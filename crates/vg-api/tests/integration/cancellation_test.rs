//! Client disconnect during a streaming `/chat` run cancels the
//! still-running workers rather than letting them run to completion
//! unread.

mod common;

use std::time::Duration;

#[tokio::test]
async fn disconnecting_mid_stream_cancels_in_flight_workers() {
    let server = common::start_with_options(common::StartOptions {
        generate_delay: Duration::from_millis(800),
        ..Default::default()
    })
    .await;

    let client = reqwest::Client::new();
    let mut resp = client
        .post(format!("{}/chat", server.base_url))
        .json(&serde_json::json!({
            "query": "Conflict escalation and hotspots in Sudan 2022-2025",
            "stream": true,
        }))
        .send()
        .await
        .expect("request failed");
    assert!(resp.status().is_success());

    // Read only the first chunk (the worker-started frames) and drop the
    // response before the run can finish — the delayed `/generate` mock
    // guarantees the workers are still in flight at this point.
    let _ = resp.chunk().await.expect("read first chunk");
    drop(resp);

    // Give the cancelled pipeline time to unwind and persist its record;
    // a cancelled worker returns in well under this window since it no
    // longer waits on the delayed mock.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let history_client = reqwest::Client::new();
    loop {
        let history = history_client
            .get(format!("{}/history?n=1", server.base_url))
            .send()
            .await
            .expect("history request failed")
            .json::<serde_json::Value>()
            .await
            .expect("parse history json");

        let runs = history["runs"].as_array().expect("runs array");
        if let Some(run) = runs.first() {
            let workers = run["worker_results"].as_array().expect("worker_results array");
            let any_cancelled = workers.iter().any(|w| w["structured_output"]["error_kind"] == "cancelled");
            if any_cancelled {
                return;
            }
        }

        if tokio::time::Instant::now() >= deadline {
            panic!("no cancelled worker result appeared in history within the deadline");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
