use serde::{Deserialize, Serialize};

/// Ollama API response for model list
#[derive(Debug, Deserialize)]
pub struct OllamaListResponse {
    /// List of models installed in Ollama.
    pub models: Vec<OllamaModel>,
}

/// Information about an Ollama model returned from the API.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    /// Model identifier, including its tag.
    pub name: String,
    /// Size of the model in bytes.
    #[serde(default)]
    pub size: u64,
    /// Content digest for the model.
    #[serde(default)]
    pub digest: String,
    /// Timestamp of last modification.
    #[serde(default)]
    pub modified_at: String,
}

/// Ollama API request for generation
#[derive(Debug, Serialize)]
pub struct OllamaGenerateRequest<'req> {
    /// Model to use for generation.
    pub model: &'req str,
    /// Input prompt for the model.
    pub prompt: &'req str,
    /// Sampling options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
    /// Whether to stream the response. Always `false` for routed calls.
    pub stream: bool,
}

/// Sampling options understood by `/api/generate`.
#[derive(Debug, Serialize)]
pub struct OllamaOptions {
    /// Sampling temperature (0.0 to 1.0).
    pub temperature: f32,
}

/// Ollama API response for generation
#[derive(Debug, Deserialize)]
pub struct OllamaGenerateResponse {
    /// Model that generated the response.
    #[serde(default)]
    pub model: String,
    /// Generated text content.
    pub response: String,
    /// Whether generation is complete.
    #[serde(default)]
    pub done: bool,
    /// Total time taken in nanoseconds.
    #[serde(default)]
    pub total_duration: u64,
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_eval_count: u64,
    /// Number of tokens generated.
    #[serde(default)]
    pub eval_count: u64,
}
