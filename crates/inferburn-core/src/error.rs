use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferBurnError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Health check failed for {endpoint}: {reason}")]
    HealthCheck { endpoint: String, reason: String },

    #[error("Failed to write report to {}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InferBurnError>;
