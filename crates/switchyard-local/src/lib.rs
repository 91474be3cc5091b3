//! Local inference backend served by an Ollama runtime.

pub mod error;
pub mod inference;
pub mod manager;
pub mod models;

pub use error::{LocalError, Result};
pub use inference::LocalModelProvider;
pub use manager::OllamaManager;
pub use models::{OllamaGenerateRequest, OllamaGenerateResponse, OllamaModel};

/// Default address of a locally running Ollama daemon.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
