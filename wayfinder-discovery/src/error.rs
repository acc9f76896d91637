use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Graph error: {0}")]
    GraphError(#[from] wayfinder_core::NavError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Discovery cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
