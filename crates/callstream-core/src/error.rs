use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CallError>;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file not found: {path}")]
    MissingConfig { path: PathBuf },

    #[error("invalid value for {var}: {value:?} (expected 1/true/0/false)")]
    InvalidEnv { var: &'static str, value: String },
}
