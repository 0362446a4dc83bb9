//! HTTP-backed Generator adapter, speaking a minimal local-inference-server
//! protocol. Grounded on this lineage's reference worker bridge: JSON
//! request/response over `reqwest`, a bounded retry loop with exponential
//! backoff on transient errors.

use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use vg_ports::{Generator, GeneratorError};

const MAX_RETRIES: u32 = 2;
const BACKOFF_BASE_MS: u64 = 100;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    delta: String,
}

pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            request_timeout,
        }
    }

    async fn post_with_retry<TReq: Serialize, TResp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TResp, GeneratorError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            let result = self
                .client
                .post(&url)
                .json(body)
                .timeout(self.request_timeout)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<TResp>()
                        .await
                        .map_err(|e| GeneratorError::MalformedResponse { message: e.to_string() });
                }
                Ok(resp) => {
                    let status = resp.status();
                    if attempt >= MAX_RETRIES || !status.is_server_error() {
                        return Err(GeneratorError::Unavailable {
                            message: format!("generation service returned {status}"),
                        });
                    }
                }
                Err(e) if e.is_timeout() => {
                    if attempt >= MAX_RETRIES {
                        return Err(GeneratorError::Timeout {
                            elapsed_ms: self.request_timeout.as_millis() as u64,
                        });
                    }
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(GeneratorError::Unavailable { message: e.to_string() });
                    }
                }
            }

            attempt += 1;
            let backoff = Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt - 1));
            warn!(attempt, backoff_ms = backoff.as_millis() as u64, path, "retrying generation request");
            tokio::time::sleep(backoff).await;
        }
    }
}

impl Generator for HttpGenerator {
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GeneratorError> {
        let req = GenerateRequest {
            prompt,
            model: model_id,
            stream: false,
        };
        let resp: GenerateResponse = self.post_with_retry("/generate", &req).await?;
        Ok(resp.text)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> Result<BoxStream<'static, Result<String, GeneratorError>>, GeneratorError> {
        let url = format!("{}/generate", self.base_url);
        let req = GenerateRequest {
            prompt,
            model: model_id,
            stream: true,
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| GeneratorError::Unavailable { message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(GeneratorError::Unavailable {
                message: format!("generation service returned {}", resp.status()),
            });
        }

        let byte_stream = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut buf = String::new();
            tokio::pin!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(GeneratorError::Unavailable { message: e.to_string() });
                        return;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].to_string();
                    buf.drain(..=pos);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StreamChunk>(&line) {
                        Ok(c) => yield Ok(c.delta),
                        Err(e) => yield Err(GeneratorError::MalformedResponse { message: e.to_string() }),
                    }
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, GeneratorError> {
        let req = EmbedRequest { text, model: model_id };
        let resp: EmbedResponse = self
            .post_with_retry("/embed", &req)
            .await
            .map_err(|e| match e {
                GeneratorError::Unavailable { message } => GeneratorError::EmbedderUnavailable { message },
                other => other,
            })?;
        Ok(resp.embedding)
    }
}
