//! Common error type and result alias.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdError {
    /// Network failure, timeout, or an unreadable response body.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Stable Diffusion API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// No model descriptor carried the requested title.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid generation parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SdResult<T> = Result<T, SdError>;
