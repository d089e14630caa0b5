/// Error types shared across the shopscan binaries.
///
/// These errors represent failures in shared infrastructure (Redis, CSV files, rule sets,
/// the worker group). Per-URL fetch failures are not errors at this level: they become
/// `Outcome::FetchFailed` results. Binary-specific errors wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid rule set: {0}")]
    RuleSet(String),

    #[error(transparent)]
    Dispatch(#[from] crate::dispatch::DispatchError),
}
