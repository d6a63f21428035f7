//! Error types for petriflow-script

use thiserror::Error;

/// Document loading and saving error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid net: {0}")]
    Core(#[from] petriflow_core::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] petriflow_engine::Error),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
