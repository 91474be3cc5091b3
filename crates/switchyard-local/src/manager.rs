use crate::models::{OllamaListResponse, OllamaModel};
use crate::{DEFAULT_OLLAMA_URL, LocalError, Result};
use reqwest::Client;
use std::time::Duration;

/// Queries the Ollama runtime for liveness and installed models
pub struct OllamaManager {
    /// HTTP client used to interact with the Ollama service.
    client: Client,
    /// Base URL pointing to the Ollama runtime.
    base_url: String,
}

impl OllamaManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_owned();
        self
    }

    /// Base URL of the runtime.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama answers within `timeout`
    pub async fn is_available(&self, timeout: Duration) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(timeout)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    /// List installed models
    ///
    /// # Errors
    ///
    /// Returns an error if Ollama is not available or if the response cannot be parsed
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|error| LocalError::OllamaUnavailable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(LocalError::Status(response.status().as_u16()));
        }

        let list: OllamaListResponse = response.json().await?;
        Ok(list.models)
    }

    /// Check if a specific model is installed
    ///
    /// # Errors
    ///
    /// Returns an error if the model list cannot be retrieved
    pub async fn has_model(&self, model_name: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|model| model.name.starts_with(model_name)))
    }
}

impl Default for OllamaManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_manager_creation() {
        let manager = OllamaManager::new();
        assert_eq!(manager.base_url(), "http://localhost:11434");
    }

    #[test]
    fn custom_url() {
        let manager = OllamaManager::new().with_url("http://custom:8080/".to_owned());
        assert_eq!(manager.base_url(), "http://custom:8080");
    }

    #[tokio::test]
    async fn unreachable_runtime_is_unavailable() {
        let manager = OllamaManager::new().with_url("http://127.0.0.1:9".to_owned());
        assert!(!manager.is_available(Duration::from_secs(2)).await);
        assert!(matches!(
            manager.list_models().await,
            Err(LocalError::OllamaUnavailable(_))
        ));
    }
}
