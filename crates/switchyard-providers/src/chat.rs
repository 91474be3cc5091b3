use reqwest::{Client, Error as ReqwestError, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use switchyard_core::{
    Completion, ErrorClass, HealthReport, ModelSpec, ProviderError, ProviderResult,
};
use tracing::{debug, warn};

/// Request payload for an OpenAI-style chat completion API.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'req> {
    /// Model identifier
    model: &'req str,
    /// Conversation messages
    messages: Vec<ChatMessage<'req>>,
    /// Sampling temperature
    temperature: f32,
}

/// One message of the conversation.
#[derive(Debug, Serialize)]
struct ChatMessage<'req> {
    /// Author role
    role: &'static str,
    /// Message text
    content: &'req str,
}

impl<'req> ChatRequest<'req> {
    /// Single-turn request carrying the prompt as the user message.
    pub(crate) fn single_turn(model: &'req str, prompt: &'req str) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
        }
    }
}

/// Response payload of a chat completion.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Candidate completions
    choices: Vec<ChatChoice>,
    /// Token accounting, absent on some gateways
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Map an HTTP status to a failure class.
///
/// Only payload rejections blame the caller. A 404 means the configured model
/// is gone from the provider, and 401/403 mean the configured key is bad, so
/// both stay fallback-eligible and count against the provider's health.
pub fn classify_status(status: StatusCode) -> ErrorClass {
    match status.as_u16() {
        429 => ErrorClass::RateLimited,
        400 | 413 | 422 => ErrorClass::InvalidRequest,
        408 | 502..=504 => ErrorClass::Unavailable,
        _ => ErrorClass::ProviderInternal,
    }
}

/// Map a transport-level failure to a classified provider error.
pub fn classify_transport(error: &ReqwestError, provider: &str) -> ProviderError {
    if error.is_timeout() {
        ProviderError::unavailable(format!("{provider} request timed out"))
    } else if error.is_connect() || error.is_request() {
        ProviderError::unavailable(format!("{provider} unreachable: {error}"))
    } else {
        ProviderError::internal(format!("{provider} request failed: {error}"))
    }
}

/// Send a prepared chat request and normalize the outcome.
pub(crate) async fn send_chat(
    request: RequestBuilder,
    model: &ModelSpec,
    timeout: Duration,
    provider: &str,
) -> ProviderResult<Completion> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|error| classify_transport(&error, provider))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!(provider, %status, "Chat completion rejected");
        return Err(ProviderError::new(
            classify_status(status),
            format!("{provider} API error {status}: {error_text}"),
        ));
    }

    let chat_response: ChatResponse = response.json().await.map_err(|error| {
        if error.is_timeout() {
            ProviderError::unavailable(format!("{provider} response timed out"))
        } else {
            ProviderError::internal(format!("Failed to parse {provider} response: {error}"))
        }
    })?;

    let text = chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::internal(format!("No completion returned by {provider}")))?;

    let (input_tokens, output_tokens) = chat_response
        .usage
        .map_or((0, 0), |usage| (usage.prompt_tokens, usage.completion_tokens));

    debug!(provider, model = %model.id, input_tokens, output_tokens, "Chat completion received");
    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
        cost: model.cost_for(input_tokens, output_tokens),
    })
}

/// Probe a models listing endpoint.
pub(crate) async fn probe_models(
    client: &Client,
    url: &str,
    api_key: &str,
    timeout: Duration,
) -> HealthReport {
    let start = Instant::now();
    let healthy = client
        .get(url)
        .bearer_auth(api_key)
        .timeout(timeout)
        .send()
        .await
        .is_ok_and(|response| response.status().is_success());

    HealthReport {
        healthy,
        latency: start.elapsed(),
    }
}
