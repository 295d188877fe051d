use std::time::Duration;

use thiserror::Error;

/// Page-local transport failure. Produces a failed outcome, never aborts a run.
#[derive(Debug, Error)]
#[error("fetch {url} failed: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchCause,
}

#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn new(url: &str, cause: FetchCause) -> Self {
        Self { url: url.to_string(), cause }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
}
