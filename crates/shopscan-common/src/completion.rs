/// Client for a locally hosted text-generation server (llama.cpp style `/completion`).
///
/// Requests are `{"prompt": ..., "n_predict": ...}`; the generated text is read from the
/// `content` field, falling back to `response` for servers that use that name. Transient
/// failures are retried with exponential backoff.
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::retry::{with_retry, RetryPolicy};

#[derive(Clone, Debug)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub n_predict: u32,
    pub max_error_body_bytes: usize,
}

impl CompletionConfig {
    /// Optional variables:
    /// - `COMPLETION_URL` (default "http://localhost:8080/completion")
    /// - `COMPLETION_TIMEOUT_SECS` (120)
    /// - `COMPLETION_MAX_RETRIES` (5)
    /// - `COMPLETION_RETRY_INITIAL_MS` (2000)
    /// - `COMPLETION_RETRY_MAX_MS` (60000)
    /// - `COMPLETION_N_PREDICT` (256)
    pub fn from_env() -> Self {
        let endpoint = std::env::var("COMPLETION_URL")
            .unwrap_or_else(|_| "http://localhost:8080/completion".to_string());

        let timeout = std::env::var("COMPLETION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(120));

        let max_retries = std::env::var("COMPLETION_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);

        let initial_backoff = std::env::var("COMPLETION_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(2_000));

        let max_backoff = std::env::var("COMPLETION_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(60_000));

        let n_predict = std::env::var("COMPLETION_N_PREDICT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(256);

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
            retry: RetryPolicy {
                max_retries,
                initial_backoff,
                max_backoff,
                jitter: false,
            },
            n_predict,
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("server returned error: status={status} body={body}")]
    Upstream { status: StatusCode, body: String },

    #[error("response has no generated text")]
    MissingContent,
}

impl CompletionError {
    fn should_retry(&self) -> bool {
        match self {
            CompletionError::Request(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            CompletionError::Upstream { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::SERVICE_UNAVAILABLE
                    || status.is_server_error()
            }
            CompletionError::InvalidJson(_) | CompletionError::MissingContent => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Option<String>,
    response: Option<String>,
}

#[derive(Clone)]
pub struct CompletionClient {
    config: CompletionConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .user_agent("shopscan/llm-classify")
            .build()?;
        Ok(Self { config, http })
    }

    /// GET `/health` on the endpoint's origin. `true` on a 2xx answer.
    pub async fn is_healthy(&self) -> bool {
        let Some(url) = health_url(&self.config.endpoint) else {
            return false;
        };
        match self.http.get(url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "completion server health check failed");
                false
            }
        }
    }

    /// Generate a completion for `prompt`, returning the trimmed text.
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            prompt,
            n_predict: self.config.n_predict,
        };
        with_retry(&self.config.retry, "completion", CompletionError::should_retry, || async {
            let resp = self
                .http
                .post(&self.config.endpoint)
                .timeout(self.config.timeout)
                .json(&request)
                .send()
                .await?;

            let status = resp.status();
            let body = resp.bytes().await?;
            if !status.is_success() {
                let mut body = body.to_vec();
                body.truncate(self.config.max_error_body_bytes);
                return Err(CompletionError::Upstream {
                    status,
                    body: String::from_utf8_lossy(&body).to_string(),
                });
            }

            let parsed: CompletionResponse = serde_json::from_slice(&body)?;
            extract_text(parsed)
        })
        .await
    }
}

fn extract_text(resp: CompletionResponse) -> Result<String, CompletionError> {
    resp.content
        .or(resp.response)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(CompletionError::MissingContent)
}

fn health_url(endpoint: &str) -> Option<reqwest::Url> {
    let parsed = reqwest::Url::parse(endpoint).ok()?;
    parsed.join("/health").ok()
}
