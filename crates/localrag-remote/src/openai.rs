use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use localrag_core::config::{EmbedderSettings, GeneratorSettings};
use localrag_core::traits::{Embedder, Generator};

use crate::{api_key, endpoint, post_json};

/// Chat-completions client.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        Ok(Self { client: reqwest::Client::builder().build()?, url: endpoint(base_url, "chat/completions"), api_key })
    }

    pub fn from_settings(settings: &GeneratorSettings) -> Result<Self> {
        Self::new(&settings.base_url, api_key(&settings.api_key_env)?)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = post_json(&self.client, &self.url, &self.api_key, &body).await?;
        let text = parse_chat_completion(&response)?;
        tracing::debug!(model, chars = text.len(), "completion received");
        Ok(text)
    }
}

pub(crate) fn parse_chat_completion(response: &Value) -> Result<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("completion response has no choices[0].message.content"))
}

/// Embeddings endpoint client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dim: usize,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, api_key: String, model: &str, dim: usize) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url: endpoint(base_url, "embeddings"),
            api_key,
            model: model.to_string(),
            dim,
        })
    }

    pub fn from_settings(settings: &EmbedderSettings) -> Result<Self> {
        Self::new(&settings.base_url, api_key(&settings.api_key_env)?, &settings.model, settings.dim)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "model": self.model, "input": texts, "dimensions": self.dim });
        let response = post_json(&self.client, &self.url, &self.api_key, &body).await?;
        parse_embeddings(response, texts.len(), self.dim)
    }
}

/// Rows may arrive out of order; they are placed by `index`.
pub(crate) fn parse_embeddings(response: Value, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_value(response)?;
    if parsed.data.len() != expected {
        return Err(anyhow!("embeddings response has {} rows for {} inputs", parsed.data.len(), expected));
    }
    parsed.data.sort_by_key(|row| row.index);
    parsed
        .data
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.index != i {
                Err(anyhow!("embeddings response is missing index {i}"))
            } else if row.embedding.len() != dim {
                Err(anyhow!("dim mismatch: got {} expected {}", row.embedding.len(), dim))
            } else {
                Ok(row.embedding)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_content_is_extracted() {
        let response = json!({ "choices": [{ "message": { "role": "assistant", "content": "Boil it [1]." } }] });
        assert_eq!(parse_chat_completion(&response).unwrap(), "Boil it [1].");
        assert!(parse_chat_completion(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn embeddings_are_ordered_by_index() {
        let response = json!({ "data": [
            { "index": 1, "embedding": [0.0, 1.0] },
            { "index": 0, "embedding": [1.0, 0.0] },
        ]});
        assert_eq!(parse_embeddings(response, 2, 2).unwrap(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_shape_is_checked() {
        let short = json!({ "data": [{ "index": 0, "embedding": [1.0] }] });
        assert!(parse_embeddings(short, 1, 2).is_err());
        let missing = json!({ "data": [{ "index": 0, "embedding": [1.0, 0.0] }] });
        assert!(parse_embeddings(missing, 2, 2).is_err());
        let duplicate = json!({ "data": [
            { "index": 0, "embedding": [1.0, 0.0] },
            { "index": 0, "embedding": [1.0, 0.0] },
        ]});
        assert!(parse_embeddings(duplicate, 2, 2).is_err());
    }

    #[tokio::test]
    async fn empty_input_makes_no_request() {
        let embedder = OpenAiEmbedder::new("http://127.0.0.1:9", "k".into(), "m", 2).unwrap();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
