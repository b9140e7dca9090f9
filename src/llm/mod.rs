//! LLM provider setup via rig-core.
//!
//! Provides helper functions to create provider clients from
//! [`SecretString`]-wrapped API keys. The returned clients create
//! `CompletionModel` instances via rig-core's [`CompletionClient`] trait.
//!
//! # Example
//! ```no_run
//! use jarvis_rs::llm::openrouter_client;
//! use secrecy::SecretString;
//! use rig::client::CompletionClient;
//!
//! let key = SecretString::from("sk-or-...");
//! let client = openrouter_client(&key).expect("failed to create OpenRouter client");
//! let model = client.completion_model("deepseek/deepseek-r1:free");
//! ```
//!
//! [`SecretString`]: secrecy::SecretString
//! [`CompletionClient`]: rig::client::CompletionClient

use secrecy::{ExposeSecret, SecretString};

/// Create an OpenRouter client from a secret API key.
///
/// OpenRouter fronts many chat models behind one OpenAI-compatible API;
/// it is the primary completion provider here. It serves no embedding
/// models — embeddings come from the local Ollama server instead.
///
/// # Errors
/// Returns an error if the underlying HTTP client cannot be constructed.
pub fn openrouter_client(
    api_key: &SecretString,
) -> Result<rig::providers::openrouter::Client, rig::http_client::Error> {
    rig::providers::openrouter::Client::new(api_key.expose_secret())
}

/// Create a Gemini client from a secret API key.
///
/// Used as the fallback completion provider when OpenRouter is
/// unavailable or rate-limited.
///
/// # Errors
/// Returns an error if the underlying HTTP client cannot be constructed.
pub fn gemini_client(
    api_key: &SecretString,
) -> Result<rig::providers::gemini::Client, rig::http_client::Error> {
    rig::providers::gemini::Client::new(api_key.expose_secret())
}
