use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("no path found from '{from}' to '{to}'")]
    NoPathFound { from: String, to: String },

    #[error("planning exceeded budget of {budget_ms}ms")]
    PlanningTimeout { budget_ms: u64 },

    #[error("adaptation failed: {0}")]
    AdaptationFailed(String),

    #[error("detection recovery failed: {0}")]
    DetectionRecoveryFailed(String),

    #[error("graph integrity violation: {0}")]
    GraphIntegrity(String),

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("history store error: {0}")]
    History(#[from] rusqlite::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, NavError>;
