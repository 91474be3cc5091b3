//! Provider adapters for cloud LLM services.

/// Shared OpenAI-style chat completion plumbing.
mod chat;
/// Deterministic scripted adapter for test suites.
pub mod fake;
/// Groq provider implementation.
pub mod groq;
/// `OpenRouter` provider implementation.
pub mod openrouter;

pub use chat::{classify_status, classify_transport};
pub use fake::{FakeCall, FakeOutcome, FakeProvider};
pub use groq::GroqProvider;
pub use openrouter::OpenRouterProvider;
