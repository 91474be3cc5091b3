use crate::models::{OllamaGenerateRequest, OllamaGenerateResponse, OllamaOptions};
use crate::{DEFAULT_OLLAMA_URL, LocalError, OllamaManager, Result};
use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError, StatusCode};
use std::time::{Duration, Instant};
use switchyard_core::{
    Completion, Error as CoreError, ErrorClass, HealthReport, ProviderAdapter, ProviderDescriptor,
    ProviderError, ProviderResult,
};
use tracing::debug;

/// Local model provider using Ollama
pub struct LocalModelProvider {
    client: Client,
    base_url: String,
    manager: OllamaManager,
    descriptor: ProviderDescriptor,
}

impl LocalModelProvider {
    /// Wraps a local descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is not of kind `local`.
    pub fn new(descriptor: ProviderDescriptor) -> Result<Self> {
        if !descriptor.kind.is_local() {
            return Err(LocalError::Core(CoreError::Config(format!(
                "provider '{}' is not local",
                descriptor.id
            ))));
        }

        Ok(Self {
            client: Client::new(),
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
            manager: OllamaManager::new(),
            descriptor,
        })
    }

    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_owned();
        self.manager = self.manager.with_url(url);
        self
    }

    /// Runtime manager for model listing.
    #[must_use]
    pub fn manager(&self) -> &OllamaManager {
        &self.manager
    }

    async fn generate_completion(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> ProviderResult<OllamaGenerateResponse> {
        let request = OllamaGenerateRequest {
            model: model_id,
            prompt,
            options: Some(OllamaOptions { temperature: 0.7 }),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|error| classify_transport(&error))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                classify_status(status),
                format!("Ollama returned {status}: {error_text}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|error| classify_transport(&error))
    }
}

/// Ollama answers 404 for models that are not pulled, which is the runtime's
/// problem rather than the caller's.
fn classify_status(status: StatusCode) -> ErrorClass {
    match status.as_u16() {
        400 => ErrorClass::InvalidRequest,
        429 => ErrorClass::RateLimited,
        502..=504 => ErrorClass::Unavailable,
        _ => ErrorClass::ProviderInternal,
    }
}

fn classify_transport(error: &ReqwestError) -> ProviderError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        ProviderError::unavailable(format!("Ollama unreachable: {error}"))
    } else {
        ProviderError::internal(format!("Failed to parse Ollama response: {error}"))
    }
}

#[async_trait]
impl ProviderAdapter for LocalModelProvider {
    fn capabilities(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn health_check(&self, timeout: Duration) -> HealthReport {
        let start = Instant::now();
        let healthy = self.manager.is_available(timeout).await;
        HealthReport {
            healthy,
            latency: start.elapsed(),
        }
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> ProviderResult<Completion> {
        let model = self.descriptor.model(model_id).ok_or_else(|| {
            ProviderError::invalid_request(format!(
                "{} does not serve model {model_id}",
                self.descriptor.id
            ))
        })?;

        let start = Instant::now();
        let ollama_response = self.generate_completion(model_id, prompt, timeout).await?;
        debug!(
            provider = %self.descriptor.id,
            model = model_id,
            elapsed_ms = start.elapsed().as_millis(),
            eval_count = ollama_response.eval_count,
            "Ollama generation finished"
        );

        let input_tokens = ollama_response.prompt_eval_count;
        let output_tokens = ollama_response.eval_count;

        Ok(Completion {
            text: ollama_response.response,
            input_tokens,
            output_tokens,
            cost: model.cost_for(input_tokens, output_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{ModelSpec, ModelTier, PRIVACY_SAFE_TAG, ProviderKind};
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    /// Serve one canned `404` to the first connection and return the base URL.
    async fn missing_model_server() -> String {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(error) => panic!("bind failed: {error}"),
        };
        let address = match listener.local_addr() {
            Ok(address) => address,
            Err(error) => panic!("no local address: {error}"),
        };
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buffer = vec![0_u8; 8192];
                if socket.read(&mut buffer).await.is_ok() {
                    let body = r#"{"error":"model 'llama3.2:3b' not found, try pulling it first"}"#;
                    let response = format!(
                        "HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    if socket.write_all(response.as_bytes()).await.is_ok() {
                        socket.shutdown().await.ok();
                    }
                }
            }
        });
        format!("http://{address}")
    }

    fn descriptor(kind: ProviderKind) -> ProviderDescriptor {
        ProviderDescriptor {
            id: "ollama".to_owned(),
            kind,
            models: vec![ModelSpec {
                id: "llama3.2:3b".to_owned(),
                cost_in_per_1k: 0.0,
                cost_out_per_1k: 0.0,
                capability_tags: vec![PRIVACY_SAFE_TAG.to_owned()],
                tier: ModelTier::Economy,
            }],
            base_latency_ms: 800,
            max_concurrency: 1,
        }
    }

    #[test]
    fn local_provider_creation() {
        let provider = match LocalModelProvider::new(descriptor(ProviderKind::Local)) {
            Ok(provider) => provider,
            Err(error) => panic!("creation failed: {error}"),
        };
        assert_eq!(provider.capabilities().id, "ollama");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn cloud_descriptor_rejected() {
        let result = LocalModelProvider::new(descriptor(ProviderKind::Cloud));
        assert!(matches!(result, Err(LocalError::Core(CoreError::Config(_)))));
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ErrorClass::ProviderInternal);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), ErrorClass::InvalidRequest);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), ErrorClass::Unavailable);
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorClass::ProviderInternal
        );
    }

    #[tokio::test]
    async fn missing_model_fails_provider_side() {
        let url = missing_model_server().await;
        let provider = match LocalModelProvider::new(descriptor(ProviderKind::Local)) {
            Ok(provider) => provider.with_url(url),
            Err(error) => panic!("creation failed: {error}"),
        };
        match provider
            .complete("llama3.2:3b", "hello", Duration::from_secs(5))
            .await
        {
            Err(error) => {
                assert_eq!(error.class, ErrorClass::ProviderInternal);
                assert!(error.class.is_fallback_eligible());
                assert!(error.message.contains("404"));
            }
            Ok(_) => panic!("missing model should not answer"),
        }
    }

    #[tokio::test]
    async fn unreachable_runtime_fails_unavailable() {
        let provider = match LocalModelProvider::new(descriptor(ProviderKind::Local)) {
            Ok(provider) => provider.with_url("http://127.0.0.1:9".to_owned()),
            Err(error) => panic!("creation failed: {error}"),
        };
        let result = provider
            .complete("llama3.2:3b", "hello", Duration::from_secs(2))
            .await;
        match result {
            Err(error) => assert_eq!(error.class, ErrorClass::Unavailable),
            Ok(_) => panic!("closed port should not answer"),
        }
        assert!(!provider.health_check(Duration::from_secs(2)).await.healthy);
    }
}
