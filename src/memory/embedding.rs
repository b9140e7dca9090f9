//! Text embeddings via a local Ollama server.
//!
//! Ollama's `/api/embeddings` endpoint takes one prompt per request, so
//! batch embedding is a sequential loop. Vectors are L2-normalized before
//! they leave this module; cosine distance downstream assumes unit length.

use crate::error::{Error, Result};
use crate::telemetry::genai;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Produces embedding vectors for memory content.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;
}

/// Embedding provider backed by an Ollama server.
pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dims = if model.starts_with("nomic-embed-text") {
            768
        } else {
            384
        };
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            dims,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::Validation("cannot embed empty text".to_string()));
        }

        let span = genai::start_embedding_span(&self.model, "ollama");
        let resp: EmbeddingResponse = async {
            self.client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&EmbeddingRequest {
                    model: &self.model,
                    prompt: text,
                })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .instrument(span)
        .await?;

        if resp.embedding.len() != self.dims {
            return Err(Error::Other(format!(
                "embedding model {} returned {} dimensions, expected {}",
                self.model,
                resp.embedding.len(),
                self.dims
            )));
        }

        Ok(l2_normalize(resp.embedding))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Scale a vector to unit length. Zero vectors pass through unchanged.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
