use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use localrag_core::config::RerankerSettings;
use localrag_core::traits::RerankJudge;

use crate::{api_key, endpoint, post_json};

/// Rerank endpoint client. Asks for every document back (`top_n = n`).
pub struct CohereJudge {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl CohereJudge {
    pub fn new(base_url: &str, api_key: String, model: &str) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url: endpoint(base_url, "rerank"),
            api_key,
            model: model.to_string(),
        })
    }

    /// `None` when the API key variable is unset, so callers can run without
    /// reranking.
    pub fn from_settings(settings: &RerankerSettings) -> Result<Option<Self>> {
        match api_key(&settings.api_key_env) {
            Ok(key) => Ok(Some(Self::new(&settings.base_url, key, &settings.model)?)),
            Err(e) => {
                tracing::info!(reason = %e, "reranker disabled");
                Ok(None)
            }
        }
    }
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankRow>,
}

#[derive(Deserialize)]
struct RerankRow {
    index: usize,
}

#[async_trait]
impl RerankJudge for CohereJudge {
    async fn rank(&self, query: &str, documents: &[String]) -> Result<Vec<usize>> {
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": documents.len(),
        });
        let response = post_json(&self.client, &self.url, &self.api_key, &body).await?;
        parse_rerank(response)
    }
}

/// Indices in the order the service returned them (most relevant first).
pub(crate) fn parse_rerank(response: Value) -> Result<Vec<usize>> {
    let parsed: RerankResponse = serde_json::from_value(response)?;
    Ok(parsed.results.into_iter().map(|r| r.index).collect())
}
