/// Page fetch layer.
///
/// One `reqwest` GET per attempt with a bounded timeout and redirect limit. Non-success
/// statuses and empty bodies are typed failures. Transient failures (timeouts, connect
/// errors, 429, 5xx) are retried with exponential backoff when `max_retries > 0`.
use std::time::Duration;

use reqwest::header::SET_COOKIE;
use reqwest::{redirect, StatusCode};

use crate::error::CommonError;
use crate::retry::{with_retry, RetryPolicy};

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy {
                max_retries: 0,
                initial_backoff: Duration::from_millis(2_000),
                max_backoff: Duration::from_millis(30_000),
                jitter: true,
            },
            max_redirects: 10,
            user_agent: "shopscan/0.1".to_string(),
        }
    }
}

impl FetchConfig {
    /// Optional variables, all with defaults:
    /// - `FETCH_TIMEOUT_SECS` (30)
    /// - `FETCH_MAX_RETRIES` (0)
    /// - `FETCH_RETRY_INITIAL_MS` (2000)
    /// - `FETCH_RETRY_MAX_MS` (30000)
    /// - `FETCH_MAX_REDIRECTS` (10)
    /// - `FETCH_USER_AGENT` ("shopscan/0.1")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout = std::env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let max_retries = std::env::var("FETCH_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.retry.max_retries);

        let initial_backoff = std::env::var("FETCH_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.initial_backoff);

        let max_backoff = std::env::var("FETCH_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.max_backoff);

        let max_redirects = std::env::var("FETCH_MAX_REDIRECTS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_redirects);

        let user_agent = std::env::var("FETCH_USER_AGENT").unwrap_or(defaults.user_agent);

        Self {
            timeout,
            retry: RetryPolicy {
                max_retries,
                initial_backoff,
                max_backoff,
                jitter: true,
            },
            max_redirects,
            user_agent,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned status {status}")]
    Status { status: StatusCode },

    #[error("empty response body")]
    EmptyBody,
}

impl FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            FetchError::Status { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchError::InvalidUrl(_) | FetchError::EmptyBody => false,
        }
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Decoded response text.
    pub body: String,
    /// Whether the response carried a `Set-Cookie` header.
    pub sets_cookies: bool,
}

#[derive(Clone)]
pub struct Fetcher {
    config: FetchConfig,
    http: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { config, http })
    }

    /// Fetch a page, retrying transient failures per the configured policy.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let url = normalize_url(url)?;
        with_retry(&self.config.retry, "fetch", FetchError::is_transient, || {
            self.fetch_once(&url)
        })
        .await
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let final_url = resp.url().to_string();
        let sets_cookies = resp.headers().contains_key(SET_COOKIE);
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            body,
            sets_cookies,
        })
    }
}

/// Trim the URL and add `https://` when the input has no scheme (bare domains are common
/// in business registries). Rejects values that still do not parse.
pub fn normalize_url(raw: &str) -> Result<String, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl("empty url".to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    match reqwest::Url::parse(&candidate) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(candidate),
        Ok(parsed) => Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}' in {trimmed}",
            parsed.scheme()
        ))),
        Err(e) => Err(FetchError::InvalidUrl(format!("{trimmed}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_domains() {
        assert_eq!(normalize_url(" www.hertz.de ").unwrap(), "https://www.hertz.de");
        assert_eq!(
            normalize_url("http://example.nl/shop").unwrap(),
            "http://example.nl/shop"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(normalize_url(""), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(normalize_url("ftp://files.example"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(normalize_url("https://"), Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn status_transience() {
        let transient = FetchError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        let rate_limited = FetchError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
        };
        let missing = FetchError::Status {
            status: StatusCode::NOT_FOUND,
        };
        assert!(transient.is_transient());
        assert!(rate_limited.is_transient());
        assert!(!missing.is_transient());
        assert!(!FetchError::EmptyBody.is_transient());
    }

    #[test]
    fn default_config_does_not_retry() {
        let config = FetchConfig::default();
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn invalid_url_fails_without_network() {
        let fetcher = Fetcher::new(FetchConfig::default()).expect("client builds");
        let err = fetcher.fetch("ftp://files.example/catalog").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
