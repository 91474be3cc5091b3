use crate::chat::{ChatRequest, probe_models, send_chat};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use switchyard_core::{
    Completion, Error, HealthReport, ProviderAdapter, ProviderDescriptor, ProviderError,
    ProviderResult, Result,
};

/// `OpenRouter` API base URL.
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
/// Env var key for `OpenRouter` API key.
const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
/// Attribution sent with every request.
const APP_REFERER: &str = "https://github.com/switchyard-llm/switchyard";
/// Application title shown in the `OpenRouter` dashboard.
const APP_TITLE: &str = "Switchyard";

/// Provider implementation for `OpenRouter` API.
pub struct OpenRouterProvider {
    /// HTTP client for API requests.
    client: Client,
    /// `OpenRouter` API key.
    api_key: String,
    /// API base URL.
    base_url: String,
    /// Static descriptor with model pricing.
    descriptor: ProviderDescriptor,
}

impl OpenRouterProvider {
    /// Creates a new `OpenRouterProvider` with the given API key.
    ///
    /// # Errors
    /// Returns an error if the provided API key is empty.
    pub fn new(descriptor: ProviderDescriptor, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(ENV_OPENROUTER_API_KEY.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            api_key,
            base_url: OPENROUTER_API_BASE.to_owned(),
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
impl ProviderAdapter for OpenRouterProvider {
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
            ProviderError::invalid_request(format!("OpenRouter does not serve model {model_id}"))
        })?;

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&ChatRequest::single_turn(model_id, prompt));

        send_chat(request, model, timeout, "OpenRouter").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{ErrorClass, ModelSpec, ModelTier, ProviderKind};

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            id: "openrouter".to_owned(),
            kind: ProviderKind::Cloud,
            models: vec![ModelSpec {
                id: "anthropic/claude-sonnet-4".to_owned(),
                cost_in_per_1k: 0.003,
                cost_out_per_1k: 0.015,
                capability_tags: vec!["reasoning".to_owned(), "code_generation".to_owned()],
                tier: ModelTier::Premium,
            }],
            base_latency_ms: 1500,
            max_concurrency: 4,
        }
    }

    #[test]
    fn test_openrouter_provider_rejects_empty_key() {
        let result = OpenRouterProvider::new(descriptor(), String::new());
        match result {
            Err(Error::MissingApiKey(key)) => assert_eq!(key, ENV_OPENROUTER_API_KEY),
            Err(error) => panic!("unexpected error: {error}"),
            Ok(_) => panic!("empty key should be rejected"),
        }
    }

    #[tokio::test]
    async fn test_unknown_model_never_leaves_process() {
        let provider = match OpenRouterProvider::new(descriptor(), "test_key".to_owned()) {
            Ok(provider) => provider.with_base_url("http://127.0.0.1:9".to_owned()),
            Err(error) => panic!("provider creation failed: {error}"),
        };
        let error = match provider
            .complete("openai/gpt-unknown", "hello", Duration::from_secs(1))
            .await
        {
            Ok(_) => panic!("unknown model should be rejected"),
            Err(error) => error,
        };
        assert_eq!(error.class, ErrorClass::InvalidRequest);
    }
}
