use core::result::Result as CoreResult;
use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

pub type Result<T> = CoreResult<T, LocalError>;

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("Core error: {0}")]
    Core(#[from] switchyard_core::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    #[error("Ollama not available: {0}")]
    OllamaUnavailable(String),

    #[error("Ollama returned status {0}")]
    Status(u16),
}
