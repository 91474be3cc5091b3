use crate::chat::{ChatRequest, probe_models, send_chat};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use switchyard_core::{
    Completion, Error, HealthReport, ProviderAdapter, ProviderDescriptor, ProviderError,
    ProviderResult, Result,
};

/// Groq OpenAI-compatible API base URL.
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
/// Env var key for Groq API key.
const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";

/// Groq API adapter.
pub struct GroqProvider {
    /// HTTP client for API requests.
    client: Client,
    /// Groq API key.
    api_key: String,
    /// API base URL.
    base_url: String,
    /// Static descriptor with model pricing.
    descriptor: ProviderDescriptor,
}

impl GroqProvider {
    /// Creates a new `GroqProvider` with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided API key is empty.
    pub fn new(descriptor: ProviderDescriptor, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(ENV_GROQ_API_KEY.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            api_key,
            base_url: GROQ_API_BASE.to_owned(),
            descriptor,
        })
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }
}

#[async_trait]
impl ProviderAdapter for GroqProvider {
    fn capabilities(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn health_check(&self, timeout: Duration) -> HealthReport {
        probe_models(
            &self.client,
            &format!("{}/models", self.base_url),
            &self.api_key,
            timeout,
        )
        .await
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> ProviderResult<Completion> {
        let model = self.descriptor.model(model_id).ok_or_else(|| {
            ProviderError::invalid_request(format!("Groq does not serve model {model_id}"))
        })?;

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::single_turn(model_id, prompt));

        send_chat(request, model, timeout, "Groq").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{ErrorClass, ModelSpec, ModelTier, ProviderKind};

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            id: "groq".to_owned(),
            kind: ProviderKind::Cloud,
            models: vec![ModelSpec {
                id: "llama-3.1-8b-instant".to_owned(),
                cost_in_per_1k: 0.000_05,
                cost_out_per_1k: 0.000_08,
                capability_tags: Vec::new(),
                tier: ModelTier::Standard,
            }],
            base_latency_ms: 300,
            max_concurrency: 8,
        }
    }

    #[test]
    fn test_groq_provider_rejects_empty_key() {
        let result = GroqProvider::new(descriptor(), String::new());
        assert!(matches!(result, Err(Error::MissingApiKey(_))));
    }

    #[test]
    fn test_groq_provider_base_url_override() {
        let provider = match GroqProvider::new(descriptor(), "test_key".to_owned()) {
            Ok(provider) => provider.with_base_url("http://localhost:9999/v1/".to_owned()),
            Err(error) => panic!("provider creation failed: {error}"),
        };
        assert_eq!(provider.base_url, "http://localhost:9999/v1");
        assert_eq!(provider.capabilities().id, "groq");
    }

    #[tokio::test]
    async fn test_unknown_model_is_invalid_request() {
        let provider = match GroqProvider::new(descriptor(), "test_key".to_owned()) {
            Ok(provider) => provider,
            Err(error) => panic!("provider creation failed: {error}"),
        };
        let error = match provider
            .complete("gpt-nonexistent", "hello", Duration::from_secs(1))
            .await
        {
            Ok(_) => panic!("unknown model should be rejected"),
            Err(error) => error,
        };
        assert_eq!(error.class, ErrorClass::InvalidRequest);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let provider = match GroqProvider::new(descriptor(), "test_key".to_owned()) {
            Ok(provider) => provider.with_base_url("http://127.0.0.1:9".to_owned()),
            Err(error) => panic!("provider creation failed: {error}"),
        };
        let error = match provider
            .complete("llama-3.1-8b-instant", "hello", Duration::from_secs(2))
            .await
        {
            Ok(_) => panic!("closed port should not answer"),
            Err(error) => error,
        };
        assert_eq!(error.class, ErrorClass::Unavailable);

        let report = provider.health_check(Duration::from_secs(2)).await;
        assert!(!report.healthy);
    }
}
