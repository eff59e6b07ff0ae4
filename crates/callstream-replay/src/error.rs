use std::path::PathBuf;

use callstream_core::CallError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] CallError),

    #[error("script has no steps: {path}")]
    EmptyScript { path: PathBuf },
}

impl ReplayError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Json(_) | Self::EmptyScript { .. } => 3,
            Self::Io(_) => 1,
        }
    }
}
