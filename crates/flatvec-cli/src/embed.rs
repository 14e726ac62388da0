//! Embedding providers: a local token-hashing fallback and the OpenAI API.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;

/// Turns text into a fixed-dimension vector.
pub trait Embedder {
    fn name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Offline token-hashing vectors, no network needed.
    Hash,
    /// OpenAI `/v1/embeddings`, needs `OPENAI_API_KEY`.
    Openai,
}

pub fn make_embedder(provider: Provider, cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match provider {
        Provider::Hash => Ok(Box::new(HashEmbedder::new(cfg.dimension))),
        Provider::Openai => Ok(Box::new(OpenAiEmbedder::from_env(cfg.model.clone())?)),
    }
}

/// Hashes whitespace-separated tokens into signed buckets and L2-normalizes.
///
/// Output is deterministic within a single toolchain build, which is all the
/// offline path needs; cross-build stability is not promised because the
/// hasher's algorithm is not.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        HashEmbedder { dim: dim.max(1) }
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// Blocking client for the OpenAI embeddings endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn from_env(model: String) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not set; required for the openai provider")?;
        Ok(OpenAiEmbedder {
            client: reqwest::blocking::Client::new(),
            api_key,
            model,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: [text],
            })
            .send()
            .context("embeddings request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body: serde_json::Value = response.json().unwrap_or_default();
            let detail = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("no error detail");
            bail!("embeddings request returned {status}: {detail}");
        }
        let mut parsed: EmbeddingResponse =
            response.json().context("malformed embeddings response")?;
        parsed
            .data
            .pop()
            .map(|row| row.embedding)
            .context("embeddings response carried no data")
    }
}
