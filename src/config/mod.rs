//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub openrouter_api_key: SecretString,
    /// Talker id that identifies the user's own messages in imported chat
    /// history. Drives the speaker-role decision during normalization.
    pub self_talker: String,
    pub ollama_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    /// Cosine similarity above which two memories are merged during
    /// consolidation. Must be in (0, 1].
    pub merge_threshold: f64,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        let merge_threshold = match std::env::var("MERGE_THRESHOLD") {
            Ok(raw) => raw.parse::<f64>().map_err(|_| {
                Error::Config(format!("MERGE_THRESHOLD is not a number: {raw}"))
            })?,
            Err(_) => 0.95,
        };
        if !(0.0..=1.0).contains(&merge_threshold) || merge_threshold == 0.0 {
            return Err(Error::Config(format!(
                "MERGE_THRESHOLD must be in (0, 1], got {merge_threshold}"
            )));
        }

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            openrouter_api_key: SecretString::from(required_var("OPENROUTER_API_KEY")?),
            self_talker: required_var("SELF_TALKER")?,
            ollama_url: std::env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text:latest".to_string()),
            chat_model: std::env::var("CHAT_MODEL")
                .unwrap_or_else(|_| "deepseek/deepseek-r1:free".to_string()),
            merge_threshold,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
