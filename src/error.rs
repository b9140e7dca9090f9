//! Error types for jarvis-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("timestamp parse error: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("embedding request failed: {0}")]
    Embedding(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
