use shopscan_common::completion::CompletionError;
use shopscan_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("completion client error: {0}")]
    Completion(#[from] CompletionError),

    #[error("config error: {0}")]
    Config(String),

    #[error("completion server not reachable at {0}")]
    ServerUnavailable(String),
}
