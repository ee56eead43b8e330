//! Pipeline-wide error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("dump parse error: {0}")]
    DumpParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] wiki_storage::StorageError),

    #[error("config error: {0}")]
    Config(String),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
